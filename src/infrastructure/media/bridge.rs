//! Media Stream Bridge
//!
//! Bridges one call's audio connection with its pipeline session.

use super::envelope::{self, InboundMessage};
use super::outbound_queue::OutboundQueue;
use crate::domain::media::{AudioFormat, FrameChunker, MediaFrame, OutboundConverter};
use crate::domain::pipeline::{CancelToken, PipelineConsumer, PipelineSession, SessionBinding};
use crate::domain::shared::{CorrelationId, Result};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Why a bridge session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEnd {
    /// The platform closed the connection
    PeerClosed,
    /// Reading from the connection failed
    TransportError(String),
    /// Writing to the connection failed
    SinkClosed(String),
    /// The session was cancelled locally
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSummary {
    pub end: BridgeEnd,
    pub frames_in: u64,
    pub frames_out: u64,
    pub frames_dropped: u64,
    pub decode_failures: u64,
}

#[derive(Default)]
struct BridgeStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    frames_dropped: AtomicU64,
    decode_failures: AtomicU64,
}

impl BridgeStats {
    fn summary(&self, end: BridgeEnd) -> BridgeSummary {
        BridgeSummary {
            end,
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

/// Media Stream Bridge
///
/// Owns one audio connection at a time: decodes inbound envelopes into frames
/// for the pipeline, re-cuts pipeline output into 20 ms frames and writes them
/// back. Reading and writing run as independent flows; the session ends when
/// the connection closes, a write fails, or the session is cancelled.
pub struct MediaStreamBridge {
    pipeline: Arc<dyn PipelineConsumer>,
    sessions: Arc<MediaSessionRegistry>,
    queue_capacity: usize,
}

impl MediaStreamBridge {
    pub fn new(
        pipeline: Arc<dyn PipelineConsumer>,
        sessions: Arc<MediaSessionRegistry>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            pipeline,
            sessions,
            queue_capacity,
        }
    }

    /// Run one session to completion
    ///
    /// The binding's cancel token is always fired before this returns, so the
    /// pipeline session never outlives its transport.
    pub async fn run<S, K, E>(
        &self,
        binding: SessionBinding,
        mut stream: S,
        mut sink: K,
    ) -> Result<BridgeSummary>
    where
        S: Stream<Item = std::result::Result<Message, E>> + Unpin,
        K: Sink<Message> + Unpin,
        K::Error: Display,
        E: Display,
    {
        let correlation_id = binding.correlation_id.clone();
        let cancel = binding.cancel.clone();

        let PipelineSession { input, mut output } = match self.pipeline.open_session(binding).await {
            Ok(session) => session,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        self.sessions.register(correlation_id.clone(), cancel.clone()).await;
        info!("Media session started: correlation_id={}", correlation_id);

        let stats = BridgeStats::default();
        let queue = OutboundQueue::new(self.queue_capacity);

        let reader = read_inbound(&mut stream, input, &stats);
        let producer = produce_outbound(&mut output, &queue, &stats);
        let writer = write_outbound(&mut sink, &queue, &stats);

        let end = tokio::select! {
            end = reader => end,
            end = producer => end,
            end = writer => end,
            _ = cancel.cancelled() => BridgeEnd::Cancelled,
        };

        cancel.cancel();
        queue.close();
        if end != BridgeEnd::PeerClosed {
            if let Err(e) = sink.close().await {
                debug!("Closing media connection failed: {}", e);
            }
        }
        self.sessions.remove(&correlation_id, &cancel).await;

        let summary = stats.summary(end);
        info!(
            "Media session ended: correlation_id={}, end={:?}, frames_in={}, frames_out={}, dropped={}, decode_failures={}",
            correlation_id,
            summary.end,
            summary.frames_in,
            summary.frames_out,
            summary.frames_dropped,
            summary.decode_failures
        );
        Ok(summary)
    }
}

async fn read_inbound<S, E>(
    stream: &mut S,
    input: mpsc::Sender<MediaFrame>,
    stats: &BridgeStats,
) -> BridgeEnd
where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    let mut format = AudioFormat::OUTBOUND;
    let mut pipeline_open = true;

    while let Some(message) = stream.next().await {
        let decoded = match message {
            Ok(Message::Text(text)) => envelope::decode(&text),
            Ok(Message::Binary(bytes)) => envelope::decode_bytes(&bytes),
            Ok(Message::Close(_)) => return BridgeEnd::PeerClosed,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => return BridgeEnd::TransportError(e.to_string()),
        };

        match decoded {
            Ok(Some(InboundMessage::Metadata(metadata))) => match metadata.format() {
                Some(announced) => {
                    debug!(
                        "Inbound audio format: {} Hz, {} channel(s)",
                        announced.sample_rate, announced.channels
                    );
                    format = announced;
                }
                None => warn!("Unsupported inbound audio metadata: {:?}", metadata),
            },
            Ok(Some(InboundMessage::Audio(audio))) => {
                if audio.payload.is_empty() || !pipeline_open {
                    continue;
                }
                stats.frames_in.fetch_add(1, Ordering::Relaxed);
                counter!("media_frames_in_total").increment(1);
                if input.send(audio.into_frame(format)).await.is_err() {
                    debug!("Pipeline input closed; discarding further caller audio");
                    pipeline_open = false;
                }
            }
            Ok(None) => debug!("Ignoring non-audio media message"),
            Err(e) => {
                stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                counter!("media_decode_failures_total").increment(1);
                warn!("Dropping undecodable media message: {}", e);
            }
        }
    }

    BridgeEnd::PeerClosed
}

async fn produce_outbound(
    output: &mut mpsc::Receiver<MediaFrame>,
    queue: &OutboundQueue<MediaFrame>,
    stats: &BridgeStats,
) -> BridgeEnd {
    let mut converter = OutboundConverter::new();
    let mut chunker = FrameChunker::new();

    while let Some(frame) = output.recv().await {
        let Some(outbound) = converter.convert(&frame) else {
            stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            counter!("media_frames_dropped_total", "reason" => "unsupported_format").increment(1);
            warn!("Dropping pipeline audio in unsupported format: {:?}", frame.format);
            continue;
        };
        for chunk in chunker.push(&outbound) {
            enqueue(queue, chunk, stats);
        }
    }

    if let Some(last) = chunker.flush() {
        enqueue(queue, last, stats);
    }
    queue.close();
    debug!("Pipeline output finished");

    // Caller audio keeps flowing after the pipeline stops speaking
    std::future::pending().await
}

fn enqueue(queue: &OutboundQueue<MediaFrame>, frame: MediaFrame, stats: &BridgeStats) {
    let dropped = queue.push(frame) as u64;
    if dropped > 0 {
        stats.frames_dropped.fetch_add(dropped, Ordering::Relaxed);
        counter!("media_frames_dropped_total", "reason" => "queue_full").increment(dropped);
    }
}

async fn write_outbound<K>(
    sink: &mut K,
    queue: &OutboundQueue<MediaFrame>,
    stats: &BridgeStats,
) -> BridgeEnd
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    while let Some(frame) = queue.pop().await {
        let text = match envelope::encode_audio(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode outbound frame: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            return BridgeEnd::SinkClosed(e.to_string());
        }
        stats.frames_out.fetch_add(1, Ordering::Relaxed);
        counter!("media_frames_out_total").increment(1);
    }

    std::future::pending().await
}

/// A live media session
#[derive(Debug)]
pub struct MediaSession {
    pub correlation_id: CorrelationId,
    pub cancel: CancelToken,
    pub started_at: Instant,
}

/// Media Session Registry
///
/// Process-local index of live media sessions so a terminate handled on this
/// instance can stop the bound pipeline immediately.
pub struct MediaSessionRegistry {
    sessions: Arc<RwLock<HashMap<CorrelationId, Arc<MediaSession>>>>,
}

impl MediaSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a session; a previous session for the same call is cancelled
    pub async fn register(&self, correlation_id: CorrelationId, cancel: CancelToken) {
        let session = Arc::new(MediaSession {
            correlation_id: correlation_id.clone(),
            cancel,
            started_at: Instant::now(),
        });

        let mut sessions = self.sessions.write().await;
        if let Some(previous) = sessions.insert(correlation_id.clone(), session) {
            warn!(
                "Replacing media session for call: correlation_id={}",
                correlation_id
            );
            previous.cancel.cancel();
        }
        gauge!("media_sessions_active").set(sessions.len() as f64);
    }

    /// Remove a session if it is still the one registered under this id
    pub async fn remove(&self, correlation_id: &CorrelationId, cancel: &CancelToken) {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(correlation_id)
            .map(|session| session.cancel.same_as(cancel))
            .unwrap_or(false);
        if current {
            sessions.remove(correlation_id);
            debug!("Removed media session: correlation_id={}", correlation_id);
        }
        gauge!("media_sessions_active").set(sessions.len() as f64);
    }

    /// Cancel and remove the session for a call, if one runs on this instance
    pub async fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(correlation_id);
            gauge!("media_sessions_active").set(sessions.len() as f64);
            removed
        };

        match removed {
            Some(session) => {
                session.cancel.cancel();
                info!(
                    "Cancelled media session: correlation_id={}, age={:?}",
                    correlation_id,
                    session.started_at.elapsed()
                );
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, correlation_id: &CorrelationId) -> Option<Arc<MediaSession>> {
        self.sessions.read().await.get(correlation_id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for MediaSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_register_and_cancel() {
        let registry = MediaSessionRegistry::new();
        let id = CorrelationId::new();
        let token = CancelToken::new();

        registry.register(id.clone(), token.clone()).await;
        assert_eq!(registry.active_count().await, 1);
        assert!(registry.get(&id).await.is_some());

        assert!(registry.cancel(&id).await);
        assert!(token.is_cancelled());
        assert_eq!(registry.active_count().await, 0);
        assert!(!registry.cancel(&id).await);
    }

    #[tokio::test]
    async fn test_registry_replacement_cancels_previous() {
        let registry = MediaSessionRegistry::new();
        let id = CorrelationId::new();
        let first = CancelToken::new();
        let second = CancelToken::new();

        registry.register(id.clone(), first.clone()).await;
        registry.register(id.clone(), second.clone()).await;
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        // The stale session must not evict its replacement
        registry.remove(&id, &first).await;
        assert_eq!(registry.active_count().await, 1);

        registry.remove(&id, &second).await;
        assert_eq!(registry.active_count().await, 0);
    }
}
