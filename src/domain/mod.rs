//! Domain layer - Core call-bridging rules
//!
//! This layer contains:
//! - Call lifecycle: context, state machine, webhook events
//! - Correlation: the shared call record and its store port
//! - Media: PCM frames and outbound framing
//! - Ports: call automation (control plane) and pipeline consumer

pub mod call;
pub mod correlation;
pub mod media;
pub mod pipeline;
pub mod platform;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
