//! Interface layer - External interfaces
//!
//! This layer handles:
//! - Platform webhooks (incoming calls, lifecycle callbacks)
//! - The media WebSocket
//! - Health and metrics endpoints

pub mod api;
