//! Outbound frame chunker
//!
//! Re-cuts pipeline audio of arbitrary length into fixed 20 ms frames.

use super::frame::{AudioFormat, MediaFrame};
use bytes::{Bytes, BytesMut};

#[derive(Debug)]
pub struct FrameChunker {
    pending: BytesMut,
    frame_bytes: usize,
}

impl FrameChunker {
    pub fn new() -> Self {
        let frame_bytes = AudioFormat::outbound_frame_bytes();
        Self {
            pending: BytesMut::with_capacity(frame_bytes * 4),
            frame_bytes,
        }
    }

    /// Append outbound-format PCM and return every complete frame
    pub fn push(&mut self, frame: &MediaFrame) -> Vec<MediaFrame> {
        debug_assert_eq!(frame.format, AudioFormat::OUTBOUND);
        self.pending.extend_from_slice(&frame.payload);

        let mut frames = Vec::with_capacity(self.pending.len() / self.frame_bytes);
        while self.pending.len() >= self.frame_bytes {
            let chunk = self.pending.split_to(self.frame_bytes).freeze();
            frames.push(MediaFrame::new(AudioFormat::OUTBOUND, chunk));
        }
        frames
    }

    /// Emit the remainder zero-padded to a full frame, if any
    pub fn flush(&mut self) -> Option<MediaFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let mut last = std::mem::take(&mut self.pending);
        last.resize(self.frame_bytes, 0);
        Some(MediaFrame::new(AudioFormat::OUTBOUND, Bytes::from(last)))
    }

    /// Bytes waiting for a full frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for FrameChunker {
    fn default() -> Self {
        Self::new()
    }
}
