//! Call lifecycle events delivered by webhook

use crate::domain::shared::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const EVENT_PREFIX: &str = "Microsoft.Communication.";

/// Lifecycle event kind
///
/// `Unknown` keeps the raw type string so unrecognised deliveries can be logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallEventKind {
    IncomingCall,
    CallConnected,
    MediaStreamingStarted,
    MediaStreamingStopped,
    MediaStreamingFailed,
    TerminateCall,
    TransferCallToAgent,
    Unknown(String),
}

impl CallEventKind {
    /// Parse a platform event type, with or without the `Microsoft.Communication.` prefix
    pub fn parse(event_type: &str) -> Self {
        let short = event_type.strip_prefix(EVENT_PREFIX).unwrap_or(event_type);
        match short {
            "IncomingCall" => CallEventKind::IncomingCall,
            "CallConnected" => CallEventKind::CallConnected,
            "MediaStreamingStarted" => CallEventKind::MediaStreamingStarted,
            "MediaStreamingStopped" => CallEventKind::MediaStreamingStopped,
            "MediaStreamingFailed" => CallEventKind::MediaStreamingFailed,
            "TerminateCall" => CallEventKind::TerminateCall,
            "TransferCallToAgent" => CallEventKind::TransferCallToAgent,
            _ => CallEventKind::Unknown(event_type.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CallEventKind::IncomingCall => "IncomingCall",
            CallEventKind::CallConnected => "CallConnected",
            CallEventKind::MediaStreamingStarted => "MediaStreamingStarted",
            CallEventKind::MediaStreamingStopped => "MediaStreamingStopped",
            CallEventKind::MediaStreamingFailed => "MediaStreamingFailed",
            CallEventKind::TerminateCall => "TerminateCall",
            CallEventKind::TransferCallToAgent => "TransferCallToAgent",
            CallEventKind::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CallEventKind::Unknown(_))
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `{type, data}` element of a lifecycle callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Webhook event, never persisted
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: CallEventKind,
    pub call_connection_id: Option<String>,
    /// Correlation id assigned by the platform (`data.correlationId`)
    pub server_correlation_id: Option<String>,
    /// Correlation id taken from the callback URL path
    pub correlation_id: CorrelationId,
    pub payload: Value,
}

impl WebhookEvent {
    pub fn from_envelope(correlation_id: CorrelationId, envelope: CallbackEnvelope) -> Self {
        let call_connection_id = string_field(&envelope.data, "callConnectionId");
        let server_correlation_id = string_field(&envelope.data, "correlationId");

        Self {
            kind: CallEventKind::parse(&envelope.event_type),
            call_connection_id,
            server_correlation_id,
            correlation_id,
            payload: envelope.data,
        }
    }

    /// Read a string field from the event payload
    pub fn payload_str(&self, key: &str) -> Option<String> {
        string_field(&self.payload, key)
    }

    pub fn media_streaming_update(&self) -> MediaStreamingUpdate {
        self.payload
            .get("mediaStreamingUpdate")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn result_information(&self) -> ResultInformation {
        self.payload
            .get("resultInformation")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `mediaStreamingUpdate` block of the streaming lifecycle events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamingUpdate {
    pub content_type: Option<String>,
    pub media_streaming_status: Option<String>,
    pub media_streaming_status_details: Option<String>,
}

/// `resultInformation` block carried by failure events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInformation {
    pub code: Option<i64>,
    pub sub_code: Option<i64>,
    pub message: Option<String>,
}
