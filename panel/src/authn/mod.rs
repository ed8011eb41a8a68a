//! Request authentication

pub mod jwt;
pub mod middleware;
