//! Media domain - PCM frames exchanged with the pipeline

pub mod chunker;
pub mod frame;
pub mod resample;

pub use chunker::FrameChunker;
pub use frame::{AudioFormat, MediaFrame};
pub use resample::{LinearResampler, OutboundConverter};
