//! Call-automation port
//!
//! Commands issued to the telephony control plane. Every call is a network
//! round-trip; failures surface as [`DomainError::PlatformCommand`].
//!
//! [`DomainError::PlatformCommand`]: crate::domain::shared::DomainError::PlatformCommand

use crate::domain::shared::{PhoneNumber, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Operation context attached to the answer command
pub const ANSWER_OPERATION_CONTEXT: &str = "incomingCall";

/// Operation context attached to the transfer command
pub const TRANSFER_OPERATION_CONTEXT: &str = "TransferCallToAgent";

/// Answer an offered call and start bidirectional media streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerCallRequest {
    pub incoming_call_context: String,
    /// Where lifecycle webhooks for this call are delivered
    pub callback_uri: String,
    /// Where the platform opens the audio connection
    pub transport_url: String,
    pub operation_context: String,
}

/// Result of a successful answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredCall {
    pub call_connection_id: String,
    pub server_call_id: Option<String>,
}

/// Subset of the call connection properties we log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallConnectionProperties {
    pub call_connection_id: String,
    pub call_connection_state: Option<String>,
    pub media_streaming_subscription: Option<Value>,
}

/// Transfer the call to a phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub target: PhoneNumber,
    /// Caller id presented to the transfer target
    pub source_caller_id_number: Option<PhoneNumber>,
    pub operation_context: String,
    pub operation_callback_uri: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallAutomation: Send + Sync {
    /// Answer an incoming call
    async fn answer_call(&self, request: AnswerCallRequest) -> Result<AnsweredCall>;

    /// Fetch the properties of an established call connection
    async fn get_call_properties(&self, call_connection_id: &str)
        -> Result<CallConnectionProperties>;

    /// Hang up; `for_everyone` terminates the call for all participants
    async fn hang_up(&self, call_connection_id: &str, for_everyone: bool) -> Result<()>;

    /// Transfer the call to another participant
    async fn transfer_to_participant(
        &self,
        call_connection_id: &str,
        request: TransferRequest,
    ) -> Result<()>;
}
