//! Activity state machine guarding in-flight remote work.
//!
//! Enforces valid transitions for the one operation allowed at a time:
//! - Idle -> CreatingSession (new session requested)
//! - Idle -> Uploading (submit with staged files)
//! - Idle -> Querying (submit without staged files)
//! - Uploading -> Querying (ingest finished, ask the question)
//! - CreatingSession / Uploading / Querying -> Idle (finished or failed)

use std::fmt;

use crate::error::SessionError;

/// What the client is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activity {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting for the service to create a session.
    CreatingSession,
    /// Transferring staged files and ingesting them.
    Uploading,
    /// Waiting for an answer.
    Querying,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Idle => write!(f, "Idle"),
            Activity::CreatingSession => write!(f, "CreatingSession"),
            Activity::Uploading => write!(f, "Uploading"),
            Activity::Querying => write!(f, "Querying"),
        }
    }
}

impl Activity {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &Activity) -> bool {
        matches!(
            (self, target),
            (Activity::Idle, Activity::CreatingSession)
                | (Activity::Idle, Activity::Uploading)
                | (Activity::Idle, Activity::Querying)
                | (Activity::Uploading, Activity::Querying)
                | (Activity::CreatingSession, Activity::Idle)
                | (Activity::Uploading, Activity::Idle)
                | (Activity::Querying, Activity::Idle)
        )
    }

    /// Whether an operation is in flight.
    pub fn is_busy(&self) -> bool {
        *self != Activity::Idle
    }
}

/// Validated holder for the current [`Activity`].
///
/// Lives inside the shared chat state, so it needs no lock of its own.
#[derive(Debug, Clone, Default)]
pub struct ActivityMachine {
    current: Activity,
}

impl ActivityMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current activity.
    pub fn current(&self) -> Activity {
        self.current
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_busy()
    }

    /// Attempt to move to `target`.
    ///
    /// Starting new work while busy reports `SessionError::Busy`; any other
    /// invalid move reports `SessionError::InvalidTransition`.
    pub fn transition(&mut self, target: Activity) -> Result<(), SessionError> {
        if self.current.can_transition_to(&target) {
            tracing::debug!("Activity: {} -> {}", self.current, target);
            self.current = target;
            Ok(())
        } else if self.current.is_busy() && target != Activity::Idle {
            Err(SessionError::Busy)
        } else {
            Err(SessionError::InvalidTransition {
                from: self.current,
                to: target,
            })
        }
    }

    /// Force the machine back to Idle.
    pub fn reset(&mut self) {
        if self.current.is_busy() {
            tracing::debug!("Activity reset to Idle from {}", self.current);
        }
        self.current = Activity::Idle;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_display() {
        assert_eq!(Activity::Idle.to_string(), "Idle");
        assert_eq!(Activity::CreatingSession.to_string(), "CreatingSession");
        assert_eq!(Activity::Uploading.to_string(), "Uploading");
        assert_eq!(Activity::Querying.to_string(), "Querying");
    }

    #[test]
    fn test_valid_transitions() {
        // Starting work
        assert!(Activity::Idle.can_transition_to(&Activity::CreatingSession));
        assert!(Activity::Idle.can_transition_to(&Activity::Uploading));
        assert!(Activity::Idle.can_transition_to(&Activity::Querying));
        assert!(Activity::Uploading.can_transition_to(&Activity::Querying));

        // Finishing or failing
        assert!(Activity::CreatingSession.can_transition_to(&Activity::Idle));
        assert!(Activity::Uploading.can_transition_to(&Activity::Idle));
        assert!(Activity::Querying.can_transition_to(&Activity::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        // No overlapping work
        assert!(!Activity::CreatingSession.can_transition_to(&Activity::Querying));
        assert!(!Activity::Querying.can_transition_to(&Activity::Uploading));
        assert!(!Activity::Querying.can_transition_to(&Activity::CreatingSession));
        assert!(!Activity::Uploading.can_transition_to(&Activity::CreatingSession));

        // No self transitions
        assert!(!Activity::Idle.can_transition_to(&Activity::Idle));
        assert!(!Activity::Uploading.can_transition_to(&Activity::Uploading));
        assert!(!Activity::Querying.can_transition_to(&Activity::Querying));
    }

    #[test]
    fn test_machine_submit_path() {
        let mut machine = ActivityMachine::new();
        assert!(!machine.is_busy());

        machine.transition(Activity::Uploading).unwrap();
        machine.transition(Activity::Querying).unwrap();
        assert!(machine.is_busy());
        machine.transition(Activity::Idle).unwrap();
        assert_eq!(machine.current(), Activity::Idle);
    }

    #[test]
    fn test_machine_rejects_second_operation_as_busy() {
        let mut machine = ActivityMachine::new();
        machine.transition(Activity::Querying).unwrap();
        assert!(matches!(
            machine.transition(Activity::CreatingSession),
            Err(SessionError::Busy)
        ));
        assert_eq!(machine.current(), Activity::Querying);
    }

    #[test]
    fn test_machine_idle_to_idle_is_invalid() {
        let mut machine = ActivityMachine::new();
        assert!(matches!(
            machine.transition(Activity::Idle),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_machine_reset() {
        let mut machine = ActivityMachine::new();
        machine.transition(Activity::Uploading).unwrap();
        machine.reset();
        assert_eq!(machine.current(), Activity::Idle);
        machine.reset();
        assert_eq!(machine.current(), Activity::Idle);
    }
}
