//! Pipeline state machine.
//!
//! ```text
//! Extracting -> Moderating -> Aggregating -> Publishing -> Done
//!      \_____________________^
//! any non-terminal state -> Failed
//! ```
//!
//! Both topologies drive the same machine; only what happens inside each
//! state differs.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Extracting,
    Moderating,
    Aggregating,
    Publishing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Extracting => "extracting",
            PipelineState::Moderating => "moderating",
            PipelineState::Aggregating => "aggregating",
            PipelineState::Publishing => "publishing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Extracting, Moderating) | (Extracting, Aggregating) => true,
            (Moderating, Aggregating) => true,
            (Aggregating, Publishing) => true,
            (Publishing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one run's progress through [`PipelineState`].
#[derive(Debug, Clone)]
pub struct PipelineStateMachine {
    job_id: String,
    state: PipelineState,
}

impl PipelineStateMachine {
    /// Every run starts in `Extracting`.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: PipelineState::Extracting,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn transition(&mut self, next: PipelineState) -> WorkerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        debug!(job_id = %self.job_id, "State {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Leave `Extracting`; a run without frames goes straight to aggregation.
    pub fn extraction_finished(&mut self, frame_count: usize) -> WorkerResult<()> {
        if frame_count == 0 {
            self.transition(PipelineState::Aggregating)
        } else {
            self.transition(PipelineState::Moderating)
        }
    }

    /// Move to `Failed`. Returns `false` if the run had already terminated.
    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        debug!(job_id = %self.job_id, "State {} -> failed", self.state);
        self.state = PipelineState::Failed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = PipelineStateMachine::new("job");
        machine.extraction_finished(3).unwrap();
        assert_eq!(machine.state(), PipelineState::Moderating);
        machine.transition(PipelineState::Aggregating).unwrap();
        machine.transition(PipelineState::Publishing).unwrap();
        machine.transition(PipelineState::Done).unwrap();
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_no_frames_skips_moderation() {
        let mut machine = PipelineStateMachine::new("job");
        machine.extraction_finished(0).unwrap();
        assert_eq!(machine.state(), PipelineState::Aggregating);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut machine = PipelineStateMachine::new("job");
        let err = machine.transition(PipelineState::Publishing).unwrap_err();
        assert!(matches!(
            err,
            WorkerError::InvalidTransition {
                from: PipelineState::Extracting,
                to: PipelineState::Publishing
            }
        ));
        assert_eq!(machine.state(), PipelineState::Extracting);
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        for steps in 0..4 {
            let mut machine = PipelineStateMachine::new("job");
            let path = [
                PipelineState::Moderating,
                PipelineState::Aggregating,
                PipelineState::Publishing,
            ];
            for next in path.iter().take(steps.min(path.len())) {
                machine.transition(*next).unwrap();
            }
            assert!(machine.fail());
            assert_eq!(machine.state(), PipelineState::Failed);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut machine = PipelineStateMachine::new("job");
        machine.fail();
        assert!(!machine.fail());
        assert!(machine.transition(PipelineState::Extracting).is_err());

        assert!(!PipelineState::Done.can_transition_to(PipelineState::Failed));
    }
}
