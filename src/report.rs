//! Evidence package export.
//!
//! Layout of a package:
//!
//! ```text
//! <output_root>/<YYYYmmdd_HHMMSS>/
//!   analysis_report.csv
//!   metadata_and_filters.txt
//!   frames/<HH_MM_SS>_F<frame_number>.png
//! ```
//!
//! Frames are written first, then the CSV, then the metadata summary. A
//! failure aborts at that artifact and leaves earlier files in place. A
//! failed metadata summary after everything else succeeded is reported as
//! `ExportOutcome::Partial`.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::ImageFormat;

use crate::error::{Artifact, ExportError};
use crate::evidence::EvidenceEntry;
use crate::ingest::VideoMetadata;

pub const DEFAULT_OUTPUT_ROOT: &str = "video_analysis_output";
pub const CSV_FILE_NAME: &str = "analysis_report.csv";
pub const METADATA_FILE_NAME: &str = "metadata_and_filters.txt";
pub const FRAMES_DIR_NAME: &str = "frames";

const CSV_FIXED_HEADER: [&str; 4] = ["Image_File", "Frame_Number", "Timestamp", "Total_Detections"];
const NO_METADATA: &str =
    "No video metadata available (File not selected or error during extraction).";

#[derive(Debug)]
pub enum ExportOutcome {
    Complete {
        output_dir: PathBuf,
        frames_written: usize,
    },
    /// Frames and CSV are on disk; the metadata summary failed to write.
    /// `metadata_error` is always an `OutputIo` for `Artifact::MetadataSummary`.
    Partial {
        output_dir: PathBuf,
        frames_written: usize,
        metadata_error: ExportError,
    },
}

impl ExportOutcome {
    pub fn output_dir(&self) -> &Path {
        match self {
            ExportOutcome::Complete { output_dir, .. }
            | ExportOutcome::Partial { output_dir, .. } => output_dir,
        }
    }

    pub fn frames_written(&self) -> usize {
        match self {
            ExportOutcome::Complete { frames_written, .. }
            | ExportOutcome::Partial { frames_written, .. } => *frames_written,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ExportOutcome::Complete { .. })
    }
}

/// Export into a new timestamped directory under `output_root`.
///
/// A blank root falls back to `video_analysis_output`. Nothing is written
/// when `entries` is empty.
pub fn export_package(
    entries: &[EvidenceEntry],
    output_root: &str,
    metadata: Option<&VideoMetadata>,
    analysis_rate: &str,
) -> Result<ExportOutcome, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::EmptyEvidenceLog);
    }
    let root = match output_root.trim() {
        "" => DEFAULT_OUTPUT_ROOT,
        trimmed => trimmed,
    };
    let output_dir = Path::new(root).join(Local::now().format("%Y%m%d_%H%M%S").to_string());
    export_package_to(entries, &output_dir, metadata, analysis_rate)
}

/// Export into exactly `output_dir`, creating it if needed.
pub fn export_package_to(
    entries: &[EvidenceEntry],
    output_dir: &Path,
    metadata: Option<&VideoMetadata>,
    analysis_rate: &str,
) -> Result<ExportOutcome, ExportError> {
    let Some(first) = entries.first() else {
        return Err(ExportError::EmptyEvidenceLog);
    };

    fs::create_dir_all(output_dir)
        .map_err(|err| ExportError::io(Artifact::OutputDirectory, output_dir, err))?;
    let frames_dir = output_dir.join(FRAMES_DIR_NAME);
    fs::create_dir_all(&frames_dir)
        .map_err(|err| ExportError::io(Artifact::FramesDirectory, &frames_dir, err))?;
    log::info!("exporting {} evidence frames to {}", entries.len(), output_dir.display());

    let filter_keys: Vec<&str> = first.filters_used.keys().collect();
    let mut csv = String::new();
    write_csv_row(
        &mut csv,
        CSV_FIXED_HEADER
            .iter()
            .copied()
            .chain(filter_keys.iter().copied())
            .map(str::to_string),
    );

    for entry in entries {
        let file_name = frame_file_name(entry);
        let path = frames_dir.join(&file_name);
        entry
            .frame_image
            .image()
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|err| {
                ExportError::io(Artifact::FrameImage, &path, io::Error::new(io::ErrorKind::Other, err))
            })?;

        let fixed = [
            file_name,
            entry.frame_number.to_string(),
            entry.timestamp.clone(),
            entry.detection_count.to_string(),
        ];
        let filters = filter_keys
            .iter()
            .map(|key| entry.filters_used.get(key).unwrap_or_default().to_string());
        write_csv_row(&mut csv, fixed.into_iter().chain(filters));
    }

    let csv_path = output_dir.join(CSV_FILE_NAME);
    fs::write(&csv_path, csv).map_err(|err| ExportError::io(Artifact::CsvReport, &csv_path, err))?;

    let summary = metadata_summary(metadata, analysis_rate, first);
    let summary_path = output_dir.join(METADATA_FILE_NAME);
    if let Err(err) = fs::write(&summary_path, summary) {
        log::warn!(
            "report and {} frames saved, but {} failed to write: {}",
            entries.len(),
            summary_path.display(),
            err
        );
        return Ok(ExportOutcome::Partial {
            output_dir: output_dir.to_path_buf(),
            frames_written: entries.len(),
            metadata_error: ExportError::io(Artifact::MetadataSummary, summary_path, err),
        });
    }

    Ok(ExportOutcome::Complete {
        output_dir: output_dir.to_path_buf(),
        frames_written: entries.len(),
    })
}

/// `HH_MM_SS_F<frame>.png`
pub fn frame_file_name(entry: &EvidenceEntry) -> String {
    format!("{}_F{}.png", entry.timestamp.replace(':', "_"), entry.frame_number)
}

fn metadata_summary(
    metadata: Option<&VideoMetadata>,
    analysis_rate: &str,
    first: &EvidenceEntry,
) -> String {
    let rule = "=".repeat(20);
    let mut out = String::new();
    let _ = writeln!(out, "{} VIDEO METADATA {}", rule, rule);
    match metadata.filter(|m| !m.is_empty()) {
        Some(metadata) => {
            for (key, value) in metadata.pairs() {
                let _ = writeln!(out, "{}: {}", key, value);
            }
        }
        None => {
            let _ = writeln!(out, "{}", NO_METADATA);
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{} ANALYSIS FILTER SETTINGS {}", rule, rule);
    let _ = writeln!(out, "Analysis Rate Achieved: {}", analysis_rate);
    for (key, value) in first.filters_used.pairs() {
        let _ = writeln!(out, "{}: {}", title_case(&key.replace('_', " ")), value);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(60));
    out
}

/// Upper-case the first letter of every word, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if previous_is_letter {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_is_letter = ch.is_alphabetic();
    }
    out
}

fn write_csv_row<I>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = String>,
{
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&field);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_matches_key_labels() {
        assert_eq!(title_case("target objects"), "Target Objects");
        assert_eq!(title_case("conf threshold"), "Conf Threshold");
        assert_eq!(title_case("COLOR filter"), "Color Filter");
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let mut out = String::new();
        write_csv_row(
            &mut out,
            ["plain", "person, car", "say \"hi\""].map(str::to_string),
        );
        assert_eq!(out, "plain,\"person, car\",\"say \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn frame_file_names_replace_colons() {
        let entry = EvidenceEntry {
            frame_number: 300,
            timestamp: "00:00:10".to_string(),
            detection_count: 1,
            frame_image: crate::frame::Frame::filled(1, 1, [0, 0, 0]),
            filters_used: Default::default(),
        };
        assert_eq!(frame_file_name(&entry), "00_00_10_F300.png");
    }

    #[test]
    fn empty_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let err = export_package(&[], root.to_str().unwrap(), None, "0.00 FPS").unwrap_err();
        assert!(matches!(err, ExportError::EmptyEvidenceLog));
        assert!(!root.exists());
    }
}
