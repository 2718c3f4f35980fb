//! Wire models for the Call Automation REST API

use crate::domain::platform::{
    AnswerCallRequest, AnsweredCall, CallConnectionProperties, TransferRequest,
};
use crate::domain::shared::PhoneNumber;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallBody {
    pub incoming_call_context: String,
    pub callback_uri: String,
    pub operation_context: String,
    pub media_streaming_options: MediaStreamingOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamingOptions {
    pub transport_url: String,
    pub transport_type: &'static str,
    pub content_type: &'static str,
    pub audio_channel_type: &'static str,
    pub start_media_streaming: bool,
    pub enable_bidirectional: bool,
    pub audio_format: &'static str,
}

impl MediaStreamingOptions {
    /// Bidirectional mixed-channel PCM 16 kHz mono over a WebSocket, started on answer
    pub fn bidirectional(transport_url: String) -> Self {
        Self {
            transport_url,
            transport_type: "websocket",
            content_type: "audio",
            audio_channel_type: "mixed",
            start_media_streaming: true,
            enable_bidirectional: true,
            audio_format: "pcm16KMono",
        }
    }
}

impl From<AnswerCallRequest> for AnswerCallBody {
    fn from(request: AnswerCallRequest) -> Self {
        Self {
            incoming_call_context: request.incoming_call_context,
            callback_uri: request.callback_uri,
            operation_context: request.operation_context,
            media_streaming_options: MediaStreamingOptions::bidirectional(request.transport_url),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConnectionPropertiesDto {
    #[serde(default)]
    pub call_connection_id: String,
    pub server_call_id: Option<String>,
    pub call_connection_state: Option<String>,
    pub media_streaming_subscription: Option<Value>,
}

impl From<CallConnectionPropertiesDto> for AnsweredCall {
    fn from(dto: CallConnectionPropertiesDto) -> Self {
        Self {
            call_connection_id: dto.call_connection_id,
            server_call_id: dto.server_call_id,
        }
    }
}

impl From<CallConnectionPropertiesDto> for CallConnectionProperties {
    fn from(dto: CallConnectionPropertiesDto) -> Self {
        Self {
            call_connection_id: dto.call_connection_id,
            call_connection_state: dto.call_connection_state,
            media_streaming_subscription: dto.media_streaming_subscription,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberDto {
    pub value: String,
}

impl From<&PhoneNumber> for PhoneNumberDto {
    fn from(number: &PhoneNumber) -> Self {
        Self {
            value: number.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneIdentifierDto {
    pub kind: &'static str,
    pub phone_number: PhoneNumberDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub target_participant: PhoneIdentifierDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_caller_id_number: Option<PhoneNumberDto>,
    pub operation_context: String,
    pub operation_callback_uri: String,
}

impl From<TransferRequest> for TransferBody {
    fn from(request: TransferRequest) -> Self {
        Self {
            target_participant: PhoneIdentifierDto {
                kind: "phoneNumber",
                phone_number: PhoneNumberDto::from(&request.target),
            },
            source_caller_id_number: request.source_caller_id_number.as_ref().map(PhoneNumberDto::from),
            operation_context: request.operation_context,
            operation_callback_uri: request.operation_callback_uri,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Best-effort `code: message` summary of an error body
    pub fn summarize(body: &str) -> Option<String> {
        let parsed: ErrorResponse = serde_json::from_str(body).ok()?;
        match (parsed.error.code, parsed.error.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (Some(code), None) => Some(code),
            (None, Some(message)) => Some(message),
            (None, None) => None,
        }
    }
}
