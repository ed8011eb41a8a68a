//! Server state

use std::sync::Arc;

use crate::authn::jwt::TokenVerifier;
use crate::deploy::orchestrator::Orchestrator;
use crate::storage::applications::ApplicationStore;
use crate::terminal::TerminalBridge;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn ApplicationStore>,
    pub bridge: Arc<TerminalBridge>,
    pub verifier: Arc<TokenVerifier>,
}

impl ServerState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ApplicationStore>,
        bridge: Arc<TerminalBridge>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            bridge,
            verifier,
        }
    }
}
