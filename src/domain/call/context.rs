//! Call context - one per active call

use super::state::{CallState, CallStateMachine};
use crate::domain::correlation::CallRecord;
use crate::domain::shared::CorrelationId;

/// View of an active call assembled from its stored record
#[derive(Debug, Clone)]
pub struct CallContext {
    correlation_id: CorrelationId,
    caller_id: Option<String>,
    destination_number: Option<String>,
    call_connection_id: Option<String>,
    server_correlation_id: Option<String>,
    state_machine: CallStateMachine,
}

impl CallContext {
    pub fn from_record(correlation_id: CorrelationId, record: &CallRecord) -> Self {
        Self {
            correlation_id,
            caller_id: record.caller_id.get().cloned(),
            destination_number: record.acs_mobile_number.get().cloned(),
            call_connection_id: record.call_connection_id.get().cloned(),
            server_correlation_id: record.correlation_id.get().cloned(),
            state_machine: CallStateMachine::resume(record.current_state()),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.caller_id.as_deref()
    }

    pub fn destination_number(&self) -> Option<&str> {
        self.destination_number.as_deref()
    }

    /// Assigned by the platform once the call is answered
    pub fn call_connection_id(&self) -> Option<&str> {
        self.call_connection_id.as_deref()
    }

    pub fn server_correlation_id(&self) -> Option<&str> {
        self.server_correlation_id.as_deref()
    }

    pub fn state(&self) -> CallState {
        self.state_machine.state()
    }

    pub fn state_machine(&self) -> &CallStateMachine {
        &self.state_machine
    }

    pub fn state_machine_mut(&mut self) -> &mut CallStateMachine {
        &mut self.state_machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_record() {
        let record = CallRecord::offered("+14255550123", "+18005550100")
            .and(CallRecord::connected("conn-1", Some("corr-1")))
            .and(CallRecord::transition(CallState::Answered, "CallConnected"));
        let id = CorrelationId::new();

        let ctx = CallContext::from_record(id.clone(), &record);

        assert_eq!(ctx.correlation_id(), &id);
        assert_eq!(ctx.caller_id(), Some("+14255550123"));
        assert_eq!(ctx.destination_number(), Some("+18005550100"));
        assert_eq!(ctx.call_connection_id(), Some("conn-1"));
        assert_eq!(ctx.server_correlation_id(), Some("corr-1"));
        assert_eq!(ctx.state(), CallState::Answered);
    }

    #[test]
    fn test_context_before_answer() {
        let record = CallRecord::offered("+14255550123", "+18005550100");
        let ctx = CallContext::from_record(CorrelationId::new(), &record);
        assert!(ctx.call_connection_id().is_none());
        assert_eq!(ctx.state(), CallState::Ringing);
    }
}
