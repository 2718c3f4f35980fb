//! Pipeline consumer implementations

pub mod loopback;

pub use loopback::LoopbackPipeline;
