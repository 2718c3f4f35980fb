//! Correlation store port and the call record it holds
//!
//! Every field of [`CallRecord`] declares its merge strategy through its type:
//!
//! | field               | wire name           | strategy  |
//! |---------------------|---------------------|-----------|
//! | `caller_id`         | `caller_id`         | replace   |
//! | `acs_mobile_number` | `acs_mobile_number` | replace   |
//! | `call_connection_id`| `callConnectionId`  | replace   |
//! | `correlation_id`    | `correlationId`     | replace   |
//! | `state`             | `state`             | replace   |
//! | `events`            | `events`            | append    |
//!
//! A record used as a write is a partial record: absent `Replace` fields leave the
//! stored value untouched, so writes merge key by key.

use crate::domain::call::CallState;
use crate::domain::shared::{CorrelationId, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default record expiration, reset on every write
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(3600);

/// Merge behaviour of one record field
pub trait FieldMerge {
    fn merge_from(&mut self, incoming: Self);
}

/// Scalar field: a present incoming value replaces the stored one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Replace<T>(Option<T>);

impl<T> Replace<T> {
    pub fn set(value: T) -> Self {
        Self(Some(value))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

impl<T> Default for Replace<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> FieldMerge for Replace<T> {
    fn merge_from(&mut self, incoming: Self) {
        if incoming.0.is_some() {
            self.0 = incoming.0;
        }
    }
}

/// Sequence field: incoming elements are appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Append<T>(Vec<T>);

impl<T> Append<T> {
    pub fn of(items: Vec<T>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[T] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for Append<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> FieldMerge for Append<T> {
    fn merge_from(&mut self, incoming: Self) {
        self.0.extend(incoming.0);
    }
}

/// Call record stored under a correlation identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(default, skip_serializing_if = "Replace::is_absent")]
    pub caller_id: Replace<String>,
    #[serde(default, skip_serializing_if = "Replace::is_absent")]
    pub acs_mobile_number: Replace<String>,
    #[serde(
        rename = "callConnectionId",
        default,
        skip_serializing_if = "Replace::is_absent"
    )]
    pub call_connection_id: Replace<String>,
    /// Platform-assigned correlation id, not the key of this record
    #[serde(
        rename = "correlationId",
        default,
        skip_serializing_if = "Replace::is_absent"
    )]
    pub correlation_id: Replace<String>,
    #[serde(default, skip_serializing_if = "Replace::is_absent")]
    pub state: Replace<CallState>,
    /// Lifecycle event kinds applied to this call, oldest first
    #[serde(default, skip_serializing_if = "Append::is_empty")]
    pub events: Append<String>,
}

impl CallRecord {
    /// Record written when an inbound call is offered
    pub fn offered(caller_id: &str, destination_number: &str) -> Self {
        Self {
            caller_id: Replace::set(caller_id.to_string()),
            acs_mobile_number: Replace::set(destination_number.to_string()),
            state: Replace::set(CallState::Ringing),
            ..Default::default()
        }
    }

    /// Partial record written when the platform reports the call connected
    pub fn connected(call_connection_id: &str, server_correlation_id: Option<&str>) -> Self {
        Self {
            call_connection_id: Replace::set(call_connection_id.to_string()),
            correlation_id: server_correlation_id
                .map(|id| Replace::set(id.to_string()))
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Partial record carrying only a state change and the event that caused it
    pub fn transition(state: CallState, event: &str) -> Self {
        Self {
            state: Replace::set(state),
            events: Append::of(vec![event.to_string()]),
            ..Default::default()
        }
    }

    /// Merge a partial record into this one, field by field
    pub fn merge(&mut self, patch: CallRecord) {
        self.caller_id.merge_from(patch.caller_id);
        self.acs_mobile_number.merge_from(patch.acs_mobile_number);
        self.call_connection_id.merge_from(patch.call_connection_id);
        self.correlation_id.merge_from(patch.correlation_id);
        self.state.merge_from(patch.state);
        self.events.merge_from(patch.events);
    }

    /// Combine two partial records into one write
    pub fn and(mut self, other: CallRecord) -> Self {
        self.merge(other);
        self
    }

    pub fn current_state(&self) -> CallState {
        self.state.get().copied().unwrap_or_default()
    }
}

/// Shared correlation store
///
/// Implementations must be shared by every process instance that handles calls;
/// webhooks for one call may land on a different instance than the one that
/// answered it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Merge `patch` into the record under `key`, creating it if absent, and
    /// reset its expiration to `ttl`. Returns the merged record.
    async fn put(&self, key: &CorrelationId, patch: CallRecord, ttl: Duration)
        -> Result<CallRecord>;

    /// Current record, `None` when absent or expired
    async fn get(&self, key: &CorrelationId) -> Result<Option<CallRecord>>;

    /// Evict immediately; deleting an absent key succeeds
    async fn delete(&self, key: &CorrelationId) -> Result<()>;

    /// Number of live records (diagnostic only)
    async fn size(&self) -> Result<usize>;
}
