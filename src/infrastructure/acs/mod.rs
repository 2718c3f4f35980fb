//! Azure Communication Services call automation adapter

pub mod auth;
pub mod client;
pub mod connection_string;
pub mod models;

pub use auth::{HmacSigner, SignedHeaders};
pub use client::{AcsCallAutomationClient, DEFAULT_API_VERSION};
pub use connection_string::ConnectionString;
