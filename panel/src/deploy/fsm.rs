//! Finite State Machine for one deploy attempt
//!
//! The pipeline is strictly linear. Each stage must complete before the next
//! one may begin, and a failure is terminal for the attempt.

use serde::{Deserialize, Serialize};

/// Deploy pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStage {
    /// Attempt accepted, nothing done yet
    Pending,

    /// Creating the scratch directory
    Workspace,

    /// Cloning the repository
    Fetch,

    /// Archiving the build context
    Pack,

    /// Building and verifying the image
    Build,

    /// Creating and starting the container
    Run,

    /// Recording the result
    Persist,

    /// Attempt finished successfully
    Done,

    /// Attempt failed
    Failed,
}

impl DeployStage {
    /// Stage that follows this one on success
    pub fn next(self) -> Option<DeployStage> {
        match self {
            DeployStage::Pending => Some(DeployStage::Workspace),
            DeployStage::Workspace => Some(DeployStage::Fetch),
            DeployStage::Fetch => Some(DeployStage::Pack),
            DeployStage::Pack => Some(DeployStage::Build),
            DeployStage::Build => Some(DeployStage::Run),
            DeployStage::Run => Some(DeployStage::Persist),
            DeployStage::Persist => Some(DeployStage::Done),
            DeployStage::Done | DeployStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeployStage::Done | DeployStage::Failed)
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployStage::Pending => "pending",
            DeployStage::Workspace => "workspace",
            DeployStage::Fetch => "fetch",
            DeployStage::Pack => "pack",
            DeployStage::Build => "build",
            DeployStage::Run => "run",
            DeployStage::Persist => "persist",
            DeployStage::Done => "done",
            DeployStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Deploy event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Enter the given stage
    Enter(DeployStage),

    /// The current stage failed
    Fail(String),
}

/// Deploy FSM
#[derive(Debug, Clone)]
pub struct DeployFsm {
    stage: DeployStage,
    failed_at: Option<DeployStage>,
    error: Option<String>,
}

impl DeployFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            stage: DeployStage::Pending,
            failed_at: None,
            error: None,
        }
    }

    pub fn stage(&self) -> DeployStage {
        self.stage
    }

    /// Stage that was running when the attempt failed
    pub fn failed_at(&self) -> Option<DeployStage> {
        self.failed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<(), String> {
        match event {
            DeployEvent::Enter(target) if self.stage.next() == Some(target) => {
                self.stage = target;
                Ok(())
            }
            DeployEvent::Fail(err) if !self.stage.is_terminal() => {
                self.failed_at = Some(self.stage);
                self.error = Some(err);
                self.stage = DeployStage::Failed;
                Ok(())
            }
            event => Err(format!(
                "Invalid transition: {:?} -> {:?}",
                self.stage, event
            )),
        }
    }

    /// Shorthand for entering `stage`
    pub fn enter(&mut self, stage: DeployStage) -> Result<(), String> {
        self.process(DeployEvent::Enter(stage))
    }

    /// Shorthand for failing the current stage
    pub fn fail(&mut self, err: impl Into<String>) -> Result<(), String> {
        self.process(DeployEvent::Fail(err.into()))
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}
