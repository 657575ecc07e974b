//! Error taxonomy for the scanner.
//!
//! Pre-flight errors (`TimecodeError`, `ConfigError`) surface before any
//! resource is acquired. `RunError` ends a run and is delivered through the
//! completion event. `ExportError` covers evidence package writes; a failed
//! metadata summary is not an error but an `ExportOutcome::Partial`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimecodeError {
    #[error("invalid timecode '{0}': expected H:MM:SS with minutes and seconds below 60")]
    InvalidFormat(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("confidence threshold {0} must be in (0, 1]")]
    InvalidConfidence(f32),

    #[error("frame skip factor must be at least 1")]
    InvalidFrameSkip,

    #[error("at least one target class must be selected")]
    NoTargetClasses,

    #[error("unknown object class '{0}'")]
    UnknownClass(String),
}

impl From<TimecodeError> for ConfigError {
    fn from(err: TimecodeError) -> Self {
        ConfigError::InvalidTimeRange(err.to_string())
    }
}

/// Fatal run errors. Per-frame failures never reach this type.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("video source '{path}' is unreadable: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("analysis worker panicked")]
    WorkerPanicked,
}

/// Which part of the evidence package failed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    OutputDirectory,
    FramesDirectory,
    FrameImage,
    CsvReport,
    MetadataSummary,
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Artifact::OutputDirectory => "output directory",
            Artifact::FramesDirectory => "frames directory",
            Artifact::FrameImage => "frame image",
            Artifact::CsvReport => "CSV report",
            Artifact::MetadataSummary => "metadata summary",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("evidence log is empty; run an analysis first")]
    EmptyEvidenceLog,

    #[error("export refused while an analysis run is active")]
    RunActive,

    #[error("failed to write {artifact} at {}: {source}", path.display())]
    OutputIo {
        artifact: Artifact,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub(crate) fn io(artifact: Artifact, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::OutputIo {
            artifact,
            path: path.into(),
            source,
        }
    }
}
