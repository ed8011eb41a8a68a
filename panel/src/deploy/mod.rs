//! Deployment pipeline

pub mod builder;
pub mod fsm;
pub mod git;
pub mod launcher;
pub mod orchestrator;
pub mod package;
pub mod tagger;
pub mod workspace;
