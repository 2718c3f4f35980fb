//! Call bounded context - lifecycle of one inbound call as seen through webhooks

pub mod context;
pub mod event;
pub mod incoming;
pub mod state;

pub use context::CallContext;
pub use event::{CallEventKind, CallbackEnvelope, WebhookEvent};
pub use incoming::{CommunicationIdentifier, IncomingCallData};
pub use state::{CallState, CallStateMachine};
