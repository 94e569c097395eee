//! Archive subsystem
//!
//! Compression and extraction behind a pluggable container format.

pub mod cancel;
pub mod codec;
pub mod engine;
pub mod results;

pub use cancel::Cancellation;
pub use codec::{ArchiveCodec, TarGzCodec};
pub use engine::ArchiveEngine;
pub use results::{CompressSummary, DecompressSummary};
