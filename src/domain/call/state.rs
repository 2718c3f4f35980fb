//! Call State Machine
//!
//! Lifecycle of one answered inbound call as observed through platform webhooks.
//! The machine is rebuilt from the stored call record for every delivery, so it
//! holds nothing that is not persisted.

use super::event::CallEventKind;
use crate::domain::shared::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Call State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    /// Inbound call offered, answer command issued
    Ringing,
    /// CallConnected received
    Answered,
    /// Media streaming running on the audio connection
    StreamingStarted,
    /// Media streaming stopped by the platform
    StreamingStopped,
    /// Hang-up issued and record evicted
    Terminated,
}

impl CallState {
    /// Check if state is active (not terminated)
    pub fn is_active(&self) -> bool {
        !matches!(self, CallState::Terminated)
    }

    /// Check if the call has been answered by the platform
    pub fn is_answered(&self) -> bool {
        matches!(
            self,
            CallState::Answered | CallState::StreamingStarted | CallState::StreamingStopped
        )
    }

    /// Get state name
    pub fn name(&self) -> &'static str {
        match self {
            CallState::Ringing => "Ringing",
            CallState::Answered => "Answered",
            CallState::StreamingStarted => "StreamingStarted",
            CallState::StreamingStopped => "StreamingStopped",
            CallState::Terminated => "Terminated",
        }
    }
}

impl Default for CallState {
    fn default() -> Self {
        CallState::Ringing
    }
}

/// State Machine
#[derive(Debug, Clone)]
pub struct CallStateMachine {
    state: CallState,
}

impl CallStateMachine {
    pub fn new() -> Self {
        Self {
            state: CallState::Ringing,
        }
    }

    /// Resume from a persisted state
    pub fn resume(state: CallState) -> Self {
        Self { state }
    }

    /// Get current state
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Compute the state an event would lead to without applying it
    pub fn next_state(&self, event: &CallEventKind) -> Result<CallState> {
        use CallEventKind as E;
        use CallState as S;

        let next = match (self.state, event) {
            (S::Ringing, E::CallConnected) => S::Answered,

            (S::Answered | S::StreamingStopped, E::MediaStreamingStarted) => S::StreamingStarted,

            (S::StreamingStarted, E::MediaStreamingStopped) => S::StreamingStopped,

            // A streaming failure is recorded without moving the call
            (state, E::MediaStreamingFailed) if state.is_active() => state,

            // Transfer leaves the call where it is until the platform reports more
            (state, E::TransferCallToAgent) if state.is_answered() => state,

            (state, E::TerminateCall) if state.is_active() => S::Terminated,

            _ => {
                return Err(DomainError::InvalidStateTransition(format!(
                    "{} + {}",
                    self.state.name(),
                    event.name()
                )))
            }
        };

        Ok(next)
    }

    /// Process an event and transition state
    pub fn process_event(&mut self, event: &CallEventKind) -> Result<CallState> {
        let next = self.next_state(event)?;
        self.state = next;
        Ok(next)
    }

    /// Check if call can be transferred
    pub fn can_transfer(&self) -> bool {
        self.state.is_answered()
    }

    /// Check if call can be terminated
    pub fn can_terminate(&self) -> bool {
        self.state.is_active()
    }
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_state_transitions() {
        let mut sm = CallStateMachine::new();
        assert_eq!(sm.state(), CallState::Ringing);

        sm.process_event(&CallEventKind::CallConnected).unwrap();
        assert_eq!(sm.state(), CallState::Answered);

        sm.process_event(&CallEventKind::MediaStreamingStarted).unwrap();
        assert_eq!(sm.state(), CallState::StreamingStarted);

        sm.process_event(&CallEventKind::MediaStreamingStopped).unwrap();
        assert_eq!(sm.state(), CallState::StreamingStopped);

        sm.process_event(&CallEventKind::TerminateCall).unwrap();
        assert_eq!(sm.state(), CallState::Terminated);
    }

    #[test]
    fn test_streaming_failure_keeps_state() {
        for state in [
            CallState::Ringing,
            CallState::Answered,
            CallState::StreamingStarted,
            CallState::StreamingStopped,
        ] {
            let mut sm = CallStateMachine::resume(state);
            assert_eq!(sm.process_event(&CallEventKind::MediaStreamingFailed).unwrap(), state);
            // Repeated failures are accepted too
            assert_eq!(sm.process_event(&CallEventKind::MediaStreamingFailed).unwrap(), state);
        }

        let sm = CallStateMachine::resume(CallState::Terminated);
        assert!(sm.next_state(&CallEventKind::MediaStreamingFailed).is_err());
    }

    #[test]
    fn test_transfer_keeps_state() {
        let mut sm = CallStateMachine::resume(CallState::StreamingStarted);
        let state = sm.process_event(&CallEventKind::TransferCallToAgent).unwrap();
        assert_eq!(state, CallState::StreamingStarted);
    }

    #[test]
    fn test_transfer_before_answer_rejected() {
        let sm = CallStateMachine::new();
        assert!(!sm.can_transfer());
        assert!(sm.next_state(&CallEventKind::TransferCallToAgent).is_err());
    }

    #[test]
    fn test_terminate_from_ringing() {
        let mut sm = CallStateMachine::new();
        sm.process_event(&CallEventKind::TerminateCall).unwrap();
        assert_eq!(sm.state(), CallState::Terminated);
    }

    #[test]
    fn test_invalid_transition() {
        let mut sm = CallStateMachine::new();
        sm.process_event(&CallEventKind::CallConnected).unwrap();

        // Can't connect an already answered call
        let result = sm.process_event(&CallEventKind::CallConnected);
        assert!(matches!(result, Err(DomainError::InvalidStateTransition(_))));
        assert_eq!(sm.state(), CallState::Answered);
    }

    #[test]
    fn test_terminated_is_final() {
        let mut sm = CallStateMachine::resume(CallState::Terminated);
        assert!(!sm.can_terminate());
        assert!(sm.process_event(&CallEventKind::TerminateCall).is_err());
        assert!(sm.process_event(&CallEventKind::MediaStreamingStarted).is_err());
    }

    #[test]
    fn test_state_helpers() {
        assert!(CallState::Ringing.is_active());
        assert!(!CallState::Ringing.is_answered());
        assert!(CallState::StreamingStopped.is_answered());
        assert!(!CallState::Terminated.is_active());
        assert_eq!(CallState::default(), CallState::Ringing);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CallState::StreamingStarted).unwrap();
        assert_eq!(json, "\"StreamingStarted\"");
    }
}
