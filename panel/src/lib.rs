//! Gakwaya Panel Library
//!
//! Deployment pipeline and container terminal bridge of the Gakwaya panel.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod terminal;
pub mod utils;
