//! Inbound call notification payload

use crate::domain::shared::{DomainError, PhoneNumber, Result};
use serde::{Deserialize, Serialize};

/// Raw id prefix the platform uses for phone-number identifiers
const PHONE_RAW_ID_PREFIX: &str = "4:";

/// Communication identifier (`from` / `to` of an incoming call)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationIdentifier {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub raw_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<PhoneNumberValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhoneNumberValue {
    pub value: String,
}

impl CommunicationIdentifier {
    pub fn phone(value: &str) -> Self {
        Self {
            kind: Some("phoneNumber".to_string()),
            raw_id: Some(format!("{}{}", PHONE_RAW_ID_PREFIX, value)),
            phone_number: Some(PhoneNumberValue {
                value: value.to_string(),
            }),
        }
    }

    pub fn raw(kind: &str, raw_id: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            raw_id: Some(raw_id.to_string()),
            phone_number: None,
        }
    }

    fn is_phone_number(&self) -> bool {
        self.kind.as_deref() == Some("phoneNumber")
    }

    fn phone_value(&self) -> Option<&str> {
        self.phone_number
            .as_ref()
            .map(|p| p.value.trim())
            .filter(|v| !v.is_empty())
    }

    fn raw_value(&self) -> Option<&str> {
        self.raw_id.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Caller identifier: the phone value for phone-number identifiers, the raw id otherwise
    pub fn caller_id(&self) -> Result<String> {
        let value = if self.is_phone_number() {
            self.phone_value().or_else(|| self.raw_value())
        } else {
            self.raw_value()
        };

        value.map(str::to_string).ok_or_else(|| {
            DomainError::ValidationError("caller identifier has no phone value or raw id".into())
        })
    }

    /// Phone number of this identifier, recovered from the raw id when the
    /// structured value is missing
    pub fn phone_number(&self) -> Result<PhoneNumber> {
        if let Some(value) = self.phone_value() {
            return Ok(PhoneNumber::new(value));
        }

        self.raw_value()
            .and_then(|raw| raw.strip_prefix(PHONE_RAW_ID_PREFIX))
            .filter(|v| !v.is_empty())
            .map(PhoneNumber::new)
            .ok_or_else(|| {
                DomainError::ValidationError("identifier does not carry a phone number".into())
            })
    }
}

/// `data` of an IncomingCall event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallData {
    pub from: CommunicationIdentifier,
    pub to: CommunicationIdentifier,
    pub incoming_call_context: String,
    #[serde(default)]
    pub server_call_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl IncomingCallData {
    pub fn caller_id(&self) -> Result<String> {
        self.from.caller_id()
    }

    pub fn destination_number(&self) -> Result<PhoneNumber> {
        self.to.phone_number()
    }
}
