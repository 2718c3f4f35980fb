//! In-memory correlation store
//!
//! Same merge and expiry semantics as the Postgres store, but visible to one
//! process only. Used by tests and by embedders that run a single instance; the
//! server binary never constructs it.

use crate::domain::correlation::{CallRecord, CorrelationStore};
use crate::domain::shared::{CorrelationId, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry {
    record: CallRecord,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

pub struct InMemoryCorrelationStore {
    entries: RwLock<HashMap<CorrelationId, Entry>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}

impl Default for InMemoryCorrelationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn put(&self, key: &CorrelationId, patch: CallRecord, ttl: Duration) -> Result<CallRecord> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let mut record = match entries.remove(key) {
            Some(entry) if entry.is_live(now) => entry.record,
            _ => CallRecord::default(),
        };
        record.merge(patch);

        entries.insert(
            key.clone(),
            Entry {
                record: record.clone(),
                expires_at: now + ttl,
            },
        );

        Ok(record)
    }

    async fn get(&self, key: &CorrelationId) -> Result<Option<CallRecord>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.record.clone()))
    }

    async fn delete(&self, key: &CorrelationId) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn size(&self) -> Result<usize> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|entry| entry.is_live(now)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::CallState;
    use crate::domain::correlation::{Append, DEFAULT_RECORD_TTL};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_merge_law() {
        let store = InMemoryCorrelationStore::new();
        let key = CorrelationId::new();

        store
            .put(&key, CallRecord::offered("+14255550123", "+18005550100"), DEFAULT_RECORD_TTL)
            .await
            .unwrap();
        store
            .put(&key, CallRecord::connected("conn-1", Some("corr-1")), DEFAULT_RECORD_TTL)
            .await
            .unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(
            record,
            CallRecord::offered("+14255550123", "+18005550100")
                .and(CallRecord::connected("conn-1", Some("corr-1")))
        );
    }

    #[tokio::test]
    async fn test_append_law() {
        let store = InMemoryCorrelationStore::new();
        let key = CorrelationId::new();

        store
            .put(&key, CallRecord::transition(CallState::Answered, "CallConnected"), DEFAULT_RECORD_TTL)
            .await
            .unwrap();
        let patch = CallRecord {
            events: Append::of(vec!["MediaStreamingStarted".to_string()]),
            ..Default::default()
        };
        store.put(&key, patch, DEFAULT_RECORD_TTL).await.unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.events.items().len(), 2);
        assert_eq!(record.events.items()[1], "MediaStreamingStarted");
    }

    #[tokio::test]
    async fn test_get_missing_is_absent() {
        let store = InMemoryCorrelationStore::new();
        assert!(store.get(&CorrelationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryCorrelationStore::new();
        let key = CorrelationId::new();

        store
            .put(&key, CallRecord::offered("a", "b"), DEFAULT_RECORD_TTL)
            .await
            .unwrap();
        assert_eq!(store.size().await.unwrap(), 1);

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        store.delete(&key).await.unwrap();
        assert_eq!(store.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_record_is_absent_and_not_merged() {
        let store = InMemoryCorrelationStore::new();
        let key = CorrelationId::new();

        store
            .put(&key, CallRecord::offered("a", "b"), Duration::ZERO)
            .await
            .unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        assert_eq!(store.size().await.unwrap(), 0);

        let merged = store
            .put(&key, CallRecord::connected("conn-1", None), DEFAULT_RECORD_TTL)
            .await
            .unwrap();
        assert!(merged.caller_id.is_absent());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryCorrelationStore::new();
        store
            .put(&CorrelationId::new(), CallRecord::offered("a", "b"), Duration::ZERO)
            .await
            .unwrap();
        store
            .put(&CorrelationId::new(), CallRecord::offered("c", "d"), DEFAULT_RECORD_TTL)
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_correlation_isolation_under_concurrency() {
        let store = Arc::new(InMemoryCorrelationStore::new());
        let keys: Vec<CorrelationId> = (0..32).map(|_| CorrelationId::new()).collect();

        let mut handles = Vec::new();
        for (i, key) in keys.iter().cloned().enumerate() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let caller = format!("caller-{}", i);
                store
                    .put(&key, CallRecord::offered(&caller, "+18005550100"), DEFAULT_RECORD_TTL)
                    .await
                    .unwrap();
                let conn = format!("conn-{}", i);
                store
                    .put(&key, CallRecord::connected(&conn, None), DEFAULT_RECORD_TTL)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for (i, key) in keys.iter().enumerate() {
            let record = store.get(key).await.unwrap().unwrap();
            assert_eq!(record.caller_id.get().unwrap(), &format!("caller-{}", i));
            assert_eq!(record.call_connection_id.get().unwrap(), &format!("conn-{}", i));
        }
    }
}
