//! Pipeline consumer port
//!
//! The audio-processing pipeline (speech recognition, language model, speech
//! synthesis) lives outside this crate. A consumer opens one session per call,
//! reads decoded caller audio from `input` and produces synthesized audio on
//! `output` until its [`CancelToken`] fires.

use super::media::MediaFrame;
use super::shared::{CorrelationId, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Cancellation signal shared between the media bridge and a pipeline session
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation; idempotent
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Whether both handles signal the same session
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What a pipeline session is bound to
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub correlation_id: CorrelationId,
    pub destination_number: Option<String>,
    pub caller_id: Option<String>,
    pub cancel: CancelToken,
}

/// Channels of one running pipeline session
#[derive(Debug)]
pub struct PipelineSession {
    /// Decoded caller audio
    pub input: mpsc::Sender<MediaFrame>,
    /// Synthesized audio, any length and PCM16 format
    pub output: mpsc::Receiver<MediaFrame>,
}

#[async_trait]
pub trait PipelineConsumer: Send + Sync {
    async fn open_session(&self, binding: SessionBinding) -> Result<PipelineSession>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_same_as() {
        let token = CancelToken::new();
        assert!(token.same_as(&token.clone()));
        assert!(!token.same_as(&CancelToken::new()));
    }

    #[tokio::test]
    async fn test_cancelled_after_cancel_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }
}
