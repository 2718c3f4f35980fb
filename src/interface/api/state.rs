//! Shared handler state

use crate::application::CallEventDispatcher;
use crate::domain::correlation::CorrelationStore;
use crate::infrastructure::media::{MediaSessionRegistry, MediaStreamBridge};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CallEventDispatcher>,
    pub store: Arc<dyn CorrelationStore>,
    pub bridge: Arc<MediaStreamBridge>,
    pub sessions: Arc<MediaSessionRegistry>,
}
