//! Finite State Machine for one deployment invocation

use serde::{Deserialize, Serialize};

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Nothing has been attempted yet
    NotStarted,

    /// Launch in progress
    Provisioning,

    /// Project launched and recorded
    Committed,

    /// Launch failed, compensated and recorded
    Failed,

    /// Clean in progress
    CleaningUp,

    /// Project removed and recorded
    Deleted,

    /// Clean failed and recorded
    DeleteFailed,
}

impl WorkflowState {
    /// Terminal states accept no further events
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Committed
                | WorkflowState::Failed
                | WorkflowState::Deleted
                | WorkflowState::DeleteFailed
        )
    }
}

/// Workflow event
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Start launching the project
    Launch,

    /// Start cleaning the project
    Clean,

    /// The running branch completed and its outcome was recorded
    Succeeded,

    /// The running branch failed
    Failed(String),
}

/// Workflow FSM
#[derive(Debug, Clone)]
pub struct WorkflowFsm {
    state: WorkflowState,
    error: Option<String>,
}

impl WorkflowFsm {
    /// Create a new FSM in the not-started state
    pub fn new() -> Self {
        Self {
            state: WorkflowState::NotStarted,
            error: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Error message of a failed branch
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: WorkflowEvent) -> Result<WorkflowState, String> {
        let new_state = match (&self.state, &event) {
            (WorkflowState::NotStarted, WorkflowEvent::Launch) => WorkflowState::Provisioning,
            (WorkflowState::NotStarted, WorkflowEvent::Clean) => WorkflowState::CleaningUp,

            (WorkflowState::Provisioning, WorkflowEvent::Succeeded) => WorkflowState::Committed,
            (WorkflowState::Provisioning, WorkflowEvent::Failed(err)) => {
                self.error = Some(err.clone());
                WorkflowState::Failed
            }

            (WorkflowState::CleaningUp, WorkflowEvent::Succeeded) => WorkflowState::Deleted,
            (WorkflowState::CleaningUp, WorkflowEvent::Failed(err)) => {
                self.error = Some(err.clone());
                WorkflowState::DeleteFailed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for WorkflowFsm {
    fn default() -> Self {
        Self::new()
    }
}
