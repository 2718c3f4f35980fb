//! Loopback pipeline
//!
//! Echoes caller audio back to the caller. Stands in for the speech pipeline
//! so the telephony path can be exercised end to end.

use crate::domain::media::MediaFrame;
use crate::domain::pipeline::{PipelineConsumer, PipelineSession, SessionBinding};
use crate::domain::shared::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 64;

pub struct LoopbackPipeline {
    capacity: usize,
}

impl LoopbackPipeline {
    pub fn new() -> Self {
        Self {
            capacity: CHANNEL_CAPACITY,
        }
    }
}

impl Default for LoopbackPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineConsumer for LoopbackPipeline {
    async fn open_session(&self, binding: SessionBinding) -> Result<PipelineSession> {
        let (input_tx, mut input_rx) = mpsc::channel::<MediaFrame>(self.capacity);
        let (output_tx, output_rx) = mpsc::channel::<MediaFrame>(self.capacity);

        info!(
            "Loopback session opened: correlation_id={}, destination={}",
            binding.correlation_id,
            binding.destination_number.as_deref().unwrap_or("-")
        );

        let cancel = binding.cancel.clone();
        let correlation_id = binding.correlation_id.clone();
        tokio::spawn(async move {
            let mut echoed = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = input_rx.recv() => match frame {
                        Some(frame) => {
                            if output_tx.send(frame).await.is_err() {
                                break;
                            }
                            echoed += 1;
                        }
                        None => break,
                    },
                }
            }
            debug!(
                "Loopback session closed: correlation_id={}, frames={}",
                correlation_id, echoed
            );
        });

        Ok(PipelineSession {
            input: input_tx,
            output: output_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::AudioFormat;
    use crate::domain::pipeline::CancelToken;
    use crate::domain::shared::CorrelationId;
    use std::time::Duration;

    fn binding(cancel: CancelToken) -> SessionBinding {
        SessionBinding {
            correlation_id: CorrelationId::new(),
            destination_number: Some("+18005550100".to_string()),
            caller_id: None,
            cancel,
        }
    }

    #[tokio::test]
    async fn test_echo() {
        let pipeline = LoopbackPipeline::new();
        let mut session = pipeline.open_session(binding(CancelToken::new())).await.unwrap();

        let frame = MediaFrame::new(AudioFormat::OUTBOUND, vec![1u8, 2, 3, 4]);
        session.input.send(frame.clone()).await.unwrap();

        let echoed = tokio::time::timeout(Duration::from_secs(1), session.output.recv())
            .await
            .unwrap();
        assert_eq!(echoed, Some(frame));
    }

    #[tokio::test]
    async fn test_cancel_closes_output() {
        let pipeline = LoopbackPipeline::new();
        let cancel = CancelToken::new();
        let mut session = pipeline.open_session(binding(cancel.clone())).await.unwrap();

        cancel.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(1), session.output.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);
    }
}
