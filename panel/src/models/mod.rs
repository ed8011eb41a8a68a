//! Data models

pub mod application;
pub mod deployment;
