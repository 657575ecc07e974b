use crate::error::RunError;
use crate::filter::ValidatedDetection;
use crate::frame::Frame;
use crate::timecode::frame_time_seconds;

/// One processed (non-skipped) frame.
///
/// Ownership passes to the consumer; the engine keeps no reference.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub annotated_frame: Frame,
    pub detections: Vec<ValidatedDetection>,
    pub validated_detection_count: usize,
    /// The engine's 1-based read counter.
    pub frame_index: u64,
    /// Decoder position (next frame to read) right after this frame was read.
    pub source_frame_position: f64,
    pub video_fps: f64,
}

impl FrameResult {
    /// Source time of this frame: `(source_frame_position - 1) / video_fps`.
    pub fn source_time_seconds(&self) -> f64 {
        frame_time_seconds(self.source_frame_position, self.video_fps)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed(RunError),
}

/// Terminal event of a run.
#[derive(Debug)]
pub struct Completion {
    pub total_processing_seconds: f64,
    pub outcome: RunOutcome,
    pub frames_read: u64,
    pub frames_emitted: u64,
    pub inference_failures: u64,
}

impl Completion {
    pub fn state(&self) -> super::EngineState {
        match self.outcome {
            RunOutcome::Completed => super::EngineState::Completed,
            RunOutcome::Cancelled => super::EngineState::Cancelled,
            RunOutcome::Failed(_) => super::EngineState::Failed,
        }
    }
}

#[derive(Debug)]
pub enum EngineEvent {
    Frame(Box<FrameResult>),
    Completion(Completion),
}
