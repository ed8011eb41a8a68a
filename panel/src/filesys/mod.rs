//! File system helpers

pub mod file;
