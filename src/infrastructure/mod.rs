//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Correlation store implementations (Postgres, in-memory)
//! - Call automation REST client
//! - Media WebSocket bridge
//! - Pipeline consumer implementations

pub mod acs;
pub mod media;
pub mod persistence;
pub mod pipeline;
