#![allow(clippy::missing_docs_in_private_items)]

pub mod decode;
pub mod lines;
pub mod pipeline;
pub mod record;
pub mod sink;
mod state;

pub use decode::{DecoderTuning, FrameDecoder};
pub use lines::LineFramer;
pub use pipeline::{FileReport, IngestionPipeline, RegionReport};
