//! callbridge - bridges inbound phone calls to a real-time audio pipeline
//!
//! Answers calls offered by Azure Communication Services, correlates their
//! lifecycle webhooks through a shared store, and streams call audio to and
//! from a pipeline over a media WebSocket.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
