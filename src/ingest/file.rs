//! Local video file source.
//!
//! `FileSource` opens either:
//! - a synthetic `stub://name?frames=N&fps=F&width=W&height=H&color=C` video,
//!   generated in memory and fully seekable, or
//! - a local video file decoded with FFmpeg (feature: ingest-file-ffmpeg).
//!
//! Remote URLs are refused. Decoded frames stay in memory.

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::color::ColorName;
use crate::frame::Frame;

const STUB_SCHEME: &str = "stub://";

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a video for sequential decoding.
    pub fn open(path: &str) -> Result<Self> {
        if !is_local_path(path) {
            return Err(anyhow!(
                "video input only supports local paths (no URL schemes): '{}'",
                path
            ));
        }
        let backend = if let Some(spec) = path.strip_prefix(STUB_SCHEME) {
            FileBackend::Synthetic(SyntheticSource::parse(spec)?)
        } else {
            open_decoder(path)?
        };
        let source = Self {
            path: path.to_string(),
            backend,
        };
        let (width, height) = source.dimensions();
        log::debug!(
            "FileSource: opened {} ({}x{} @ {:.2} fps, {} frames)",
            source.path,
            width,
            height,
            source.fps(),
            source.frame_count()
        );
        Ok(source)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the source is the in-memory synthetic generator.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.backend, FileBackend::Synthetic(_))
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_decoder(path: &str) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_decoder(path: &str) -> Result<FileBackend> {
    if !std::path::Path::new(path).is_file() {
        return Err(anyhow!("video file '{}' does not exist", path));
    }
    Err(anyhow!(
        "decoding video files requires the ingest-file-ffmpeg feature"
    ))
}

impl FrameSource for FileSource {
    fn fps(&self) -> f64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.fps,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.fps(),
        }
    }

    fn frame_count(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.frames,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frame_count(),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match &self.backend {
            FileBackend::Synthetic(source) => (source.width, source.height),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.dimensions(),
        }
    }

    fn codec(&self) -> String {
        match &self.backend {
            FileBackend::Synthetic(_) => "synthetic".to_string(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.codec(),
        }
    }

    fn seek_to_frame(&mut self, index: u64) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => {
                source.next_index = index.min(source.frames);
                Ok(())
            }
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.seek_to_frame(index),
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.read_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.read_frame(),
        }
    }

    fn position(&self) -> f64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.next_index as f64,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.position(),
        }
    }
}

/// True for plain filesystem paths and `stub://` sources.
pub fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

const BACKGROUND: [u8; 3] = [128, 128, 128];

struct SyntheticSource {
    frames: u64,
    fps: f64,
    width: u32,
    height: u32,
    block: Option<[u8; 3]>,
    block_every: u64,
    fail_at: Option<u64>,
    next_index: u64,
}

impl SyntheticSource {
    fn parse(spec: &str) -> Result<Self> {
        let mut source = Self {
            frames: 300,
            fps: 30.0,
            width: 64,
            height: 48,
            block: None,
            block_every: 1,
            fail_at: None,
            next_index: 0,
        };

        let query = spec.split_once('?').map(|(_, q)| q).unwrap_or("");
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => source.frames = parse_param(key, value)?,
                "fps" => source.fps = parse_param(key, value)?,
                "width" => source.width = parse_param(key, value)?,
                "height" => source.height = parse_param(key, value)?,
                "color" => source.block = Some(block_rgb(value)?),
                "color_every" => source.block_every = parse_param(key, value)?,
                "fail_at" => source.fail_at = Some(parse_param(key, value)?),
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }

        if !source.fps.is_finite() || source.fps <= 0.0 {
            return Err(anyhow!("stub fps must be positive, got {}", source.fps));
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame dimensions must be non-zero"));
        }
        if source.block_every == 0 {
            return Err(anyhow!("stub color_every must be at least 1"));
        }
        Ok(source)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.next_index) {
            return Err(anyhow!(
                "synthetic read failure at frame {}",
                self.next_index
            ));
        }
        if self.next_index >= self.frames {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(self.render(index)))
    }

    fn render(&self, index: u64) -> Frame {
        let mut frame = Frame::filled(self.width, self.height, BACKGROUND);
        if let Some(rgb) = self.block {
            if index % self.block_every == 0 {
                let (x0, y0) = (self.width / 4, self.height / 4);
                let (x1, y1) = (x0 + self.width / 2, y0 + self.height / 2);
                let image = frame.image_mut();
                for y in y0..y1 {
                    for x in x0..x1 {
                        image.put_pixel(x, y, image::Rgb(rgb));
                    }
                }
            }
        }
        frame
    }
}

fn parse_param<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("invalid stub parameter {}='{}'", key, value))
}

fn block_rgb(name: &str) -> Result<[u8; 3]> {
    let color = ColorName::ALL
        .into_iter()
        .find(|c| c.label().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| anyhow!("unknown stub color '{}'", name))?;
    Ok(match color {
        ColorName::Red => [220, 20, 20],
        ColorName::Blue => [20, 40, 220],
        ColorName::Green => [20, 200, 40],
        ColorName::Yellow => [230, 220, 20],
        ColorName::White => [245, 245, 245],
        ColorName::Black => [10, 10, 10],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_urls() {
        assert!(FileSource::open("rtsp://camera/stream").is_err());
        assert!(FileSource::open("https://example.com/video.mp4").is_err());
        assert!(FileSource::open("").is_err());
        assert!(is_local_path("/tmp/video.mp4"));
        assert!(is_local_path("stub://clip"));
    }

    #[test]
    fn synthetic_defaults() {
        let source = FileSource::open("stub://clip").unwrap();
        assert!(source.is_synthetic());
        assert_eq!(source.frame_count(), 300);
        assert_eq!(source.fps(), 30.0);
        assert_eq!(source.dimensions(), (64, 48));
        assert_eq!(source.position(), 0.0);
    }

    #[test]
    fn position_is_next_frame_index() {
        let mut source = FileSource::open("stub://clip?frames=3&fps=10").unwrap();
        assert!(source.read_frame().unwrap().is_some());
        assert_eq!(source.position(), 1.0);
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_some());
        assert_eq!(source.position(), 3.0);
        assert!(source.read_frame().unwrap().is_none());
        assert_eq!(source.position(), 3.0);
    }

    #[test]
    fn seek_lands_on_target() {
        let mut source = FileSource::open("stub://clip?frames=100").unwrap();
        source.seek_to_frame(42).unwrap();
        assert_eq!(source.position(), 42.0);
        source.read_frame().unwrap();
        assert_eq!(source.position(), 43.0);

        source.seek_to_frame(1_000).unwrap();
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn paints_colour_block_on_selected_frames() {
        let mut source =
            FileSource::open("stub://clip?frames=4&width=8&height=8&color=red&color_every=2")
                .unwrap();
        let first = source.read_frame().unwrap().unwrap();
        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(first.image().get_pixel(4, 4).0, [220, 20, 20]);
        assert_eq!(first.image().get_pixel(0, 0).0, BACKGROUND);
        assert_eq!(second.image().get_pixel(4, 4).0, BACKGROUND);
    }

    #[test]
    fn injected_read_failure() {
        let mut source = FileSource::open("stub://clip?frames=5&fail_at=2").unwrap();
        assert!(source.read_frame().is_ok());
        assert!(source.read_frame().is_ok());
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(FileSource::open("stub://clip?fps=0").is_err());
        assert!(FileSource::open("stub://clip?fps=abc").is_err());
        assert!(FileSource::open("stub://clip?width=0").is_err());
        assert!(FileSource::open("stub://clip?color=teal").is_err());
        assert!(FileSource::open("stub://clip?bogus=1").is_err());
        assert!(FileSource::open("stub://clip?frames").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(FileSource::open("/definitely/not/here.mp4").is_err());
    }
}
