//! API interface implementations

pub mod callbacks;
pub mod dto;
pub mod event_grid;
pub mod health;
pub mod media_ws;
pub mod metrics_handler;
pub mod router;
pub mod state;

pub use metrics_handler::{init_metrics, update_correlation_records};
pub use router::build_router;
pub use state::AppState;
