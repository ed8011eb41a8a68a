//! Persistent state

pub mod applications;
pub mod settings;
