//! Media transport implementations

pub mod bridge;
pub mod envelope;
pub mod outbound_queue;

pub use bridge::{BridgeEnd, BridgeSummary, MediaSession, MediaSessionRegistry, MediaStreamBridge};
pub use envelope::{AudioData, AudioMetadata, InboundMessage};
pub use outbound_queue::OutboundQueue;
