//! Shared value objects used across multiple bounded contexts

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation identifier
///
/// Generated locally when an inbound call is offered. It is threaded through the
/// callback URL path and the media connection query string, and is the only key
/// joining webhook deliveries and the audio stream back to one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Identifier derived from an Event Grid delivery id
    ///
    /// Redeliveries of the same event map to the same call.
    pub fn for_delivery(event_id: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, event_id.as_bytes()).to_string())
    }

    /// Wrap an identifier received from the outside (URL path or query).
    ///
    /// Returns `None` for an empty or blank token.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// E.164 style phone number as delivered by the platform (e.g. `+14255550123`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_correlation_id_for_delivery_is_stable() {
        let a = CorrelationId::for_delivery("evt-1");
        assert_eq!(a, CorrelationId::for_delivery("evt-1"));
        assert_ne!(a, CorrelationId::for_delivery("evt-2"));
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_correlation_id_parse() {
        assert!(CorrelationId::parse("").is_none());
        assert!(CorrelationId::parse("   ").is_none());
        assert_eq!(CorrelationId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_correlation_id_serializes_as_string() {
        let id = CorrelationId::parse("abc-123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }
}
