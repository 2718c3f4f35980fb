//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases: it turns
//! platform webhooks into store writes and platform commands.

pub mod call_dispatcher;

pub use call_dispatcher::{CallEventDispatcher, CallbackUrls, DispatchOutcome};
