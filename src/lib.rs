//! Evidence Scanner
//!
//! Scans a recorded video for frames containing selected object classes,
//! optionally narrowed to detections whose region shows a named dominant
//! colour, and assembles the matching frames into an evidence package.
//!
//! # Pipeline
//!
//! ```text
//! video ─▶ FrameSource ─▶ VideoAnalysisEngine ─▶ FrameResult events ─▶ EvidenceRecorder ─▶ export
//!                          │ ObjectDetector
//!                          └ DetectionFilterPipeline (clamp, colour, annotate)
//! ```
//!
//! The engine runs on its own worker thread, owns the decoder and detector
//! for the length of a run, and emits events strictly in frame order.
//! Timestamps are reconstructed from the decoder position, never from wall
//! clock time.
//!
//! # Module Structure
//!
//! - `timecode`: `HH:MM:SS` parsing and formatting
//! - `color`: dominant colour matching in HSV space
//! - `frame`: owned RGB frames and pixel rectangles
//! - `detect`: object detector boundary, class tables, backends
//! - `ingest`: video decoding sources and metadata probing
//! - `filter`: detection validation and annotation
//! - `engine`: the analysis run, its events and cancellation
//! - `evidence`: the in-memory evidence log
//! - `report`: evidence package export
//! - `session`: one user workflow (file, run, evidence, export)
//! - `config`: file and environment configuration

pub mod color;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod filter;
pub mod frame;
pub mod ingest;
pub mod report;
pub mod session;
pub mod timecode;

pub use color::{ColorFilter, ColorName};
pub use config::ScannerConfig;
pub use detect::{create_detector, BoundingBox, DetectorSettings, ObjectDetector, RawDetection};
pub use engine::{
    AnalysisConfig, CancelToken, Completion, EngineEvent, EngineHandle, EngineState, FrameResult,
    RunOutcome, VideoAnalysisEngine,
};
pub use error::{Artifact, ConfigError, ExportError, RunError, TimecodeError};
pub use evidence::{EvidenceEntry, EvidenceRecorder, FilterSnapshot};
pub use filter::{Annotator, DetectionFilterPipeline, ValidatedDetection};
pub use frame::{Frame, PixelRect};
pub use ingest::{FileSource, FrameSource, VideoMetadata};
pub use report::{export_package, export_package_to, ExportOutcome};
pub use session::{Session, SessionEvent};
