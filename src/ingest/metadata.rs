use std::path::Path;

use anyhow::Result;
use chrono::Local;

use super::{FileSource, FrameSource};
use crate::timecode::format_timecode;

/// Descriptive video properties written into the evidence package.
///
/// Kept as ordered `(label, value)` pairs so the summary file lists them in
/// a fixed order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pairs: Vec<(String, String)>,
}

impl VideoMetadata {
    /// Open `path`, read its stream properties and close it again.
    pub fn probe(path: &str) -> Result<Self> {
        let source = FileSource::open(path)?;
        Ok(Self::describe(path, &source))
    }

    /// Describe an already opened source.
    pub fn describe<S: FrameSource + ?Sized>(path: &str, source: &S) -> Self {
        let (width, height) = source.dimensions();
        let fps = source.fps();
        let total_frames = source.frame_count();
        let duration = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };
        let filename = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        let pairs = vec![
            ("File Path", path.to_string()),
            ("Filename", filename),
            ("Resolution (W x H)", format!("{} x {}", width, height)),
            ("Frame Rate (FPS)", format!("{:.2}", fps)),
            ("Total Frames", total_frames.to_string()),
            ("Duration", format_timecode(duration)),
            ("Codec", source.codec()),
            ("Video Format (Container)", container_label(path)),
            (
                "Processing Date",
                Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ];
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn container_label(path: &str) -> String {
    if path.starts_with("stub://") {
        return "STUB".to_string();
    }
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_uppercase()))
        .unwrap_or_default()
}
