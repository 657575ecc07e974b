//! Video decoding sources.
//!
//! A `FrameSource` hands decoded RGB frames to the analysis engine one at a
//! time, in presentation order:
//! - Synthetic `stub://` videos (tests and demos, always available)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Sources only read local paths; anything carrying a URL scheme other than
//! `stub://` is rejected before a decoder is opened. Decoded frames are never
//! written to disk by this layer.

use anyhow::Result;

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod metadata;

pub use file::{is_local_path, FileSource};
pub use metadata::VideoMetadata;

/// A seekable, sequential frame decoder.
///
/// `position()` follows the "next frame to read" convention: after the first
/// frame of a stream has been read it reports `1.0`, so the frame just read
/// sits at `position() - 1` and its presentation time is
/// `(position() - 1) / fps()`.
pub trait FrameSource {
    /// Nominal frame rate. Always finite and positive for an open source.
    fn fps(&self) -> f64;

    /// Total frames as reported by the container; 0 when unknown.
    fn frame_count(&self) -> u64;

    /// Frame width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Short codec identifier for reports.
    fn codec(&self) -> String;

    /// Position the source so the next `read_frame` returns frame `index`.
    fn seek_to_frame(&mut self, index: u64) -> Result<()>;

    /// Decode the next frame. `Ok(None)` marks the end of the stream.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Index of the next frame to be read.
    fn position(&self) -> f64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn codec(&self) -> String {
        (**self).codec()
    }

    fn seek_to_frame(&mut self, index: u64) -> Result<()> {
        (**self).seek_to_frame(index)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_frame()
    }

    fn position(&self) -> f64 {
        (**self).position()
    }
}
