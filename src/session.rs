//! Analysis session.
//!
//! A `Session` owns everything one user workflow touches: the selected video
//! and its metadata, the evidence log, the active engine run and the live
//! throughput figures. It is created by the caller, cleared on reset or when
//! a new file is selected, and never shared between runs.

use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::detect::ObjectDetector;
use crate::engine::{
    AnalysisConfig, CancelToken, Completion, EngineEvent, EngineHandle, EngineState, FrameResult,
    VideoAnalysisEngine,
};
use crate::error::{ExportError, RunError};
use crate::evidence::{EvidenceRecorder, FilterSnapshot};
use crate::filter::Annotator;
use crate::ingest::VideoMetadata;
use crate::report::{self, ExportOutcome};

const INITIAL_RATE: &str = "0.00 FPS";

/// Event handed back to the caller after the session has processed it.
#[derive(Debug)]
pub enum SessionEvent {
    /// A processed frame. `logged` is true when it was added to the evidence
    /// log.
    Frame {
        result: Box<FrameResult>,
        logged: bool,
    },
    Completion(Completion),
}

struct ActiveRun {
    handle: EngineHandle,
    filters: FilterSnapshot,
}

pub struct Session {
    output_root: String,
    annotator: Annotator,
    video_path: Option<String>,
    metadata: Option<VideoMetadata>,
    recorder: EvidenceRecorder,
    run: Option<ActiveRun>,
    last_state: EngineState,
    analysis_rate: String,
    last_frame_at: Option<Instant>,
    progress: Option<f64>,
}

impl Session {
    pub fn new(output_root: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            annotator: Annotator::new(),
            video_path: None,
            metadata: None,
            recorder: EvidenceRecorder::new(),
            run: None,
            last_state: EngineState::Idle,
            analysis_rate: INITIAL_RATE.to_string(),
            last_frame_at: None,
            progress: None,
        }
    }

    /// Annotator used for runs started with `start_run`.
    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Select a new video. Stops any active run, clears the evidence log and
    /// probes the file's metadata.
    pub fn select_file(&mut self, path: &str) -> Result<&VideoMetadata> {
        self.reset()?;
        let metadata = VideoMetadata::probe(path)
            .map_err(|err| anyhow!("could not open video file '{}': {:#}", path, err))?;
        log::info!("selected {}", path);
        self.video_path = Some(path.to_string());
        Ok(self.metadata.insert(metadata))
    }

    /// Start analysing the selected video with the default decoder.
    pub fn start_run(
        &mut self,
        config: AnalysisConfig,
        detector: Box<dyn ObjectDetector>,
    ) -> Result<()> {
        let path = self
            .video_path
            .clone()
            .ok_or_else(|| anyhow!("no video file selected"))?;
        let engine =
            VideoAnalysisEngine::new(path, config, detector).with_annotator(self.annotator.clone());
        self.start_engine(engine)
    }

    /// Start a prepared engine. Any active run is stopped first and the
    /// evidence log is cleared.
    pub fn start_engine(&mut self, engine: VideoAnalysisEngine) -> Result<()> {
        self.stop()?;
        self.recorder.clear();
        self.analysis_rate = INITIAL_RATE.to_string();
        self.last_frame_at = None;
        self.progress = Some(0.0);

        let filters = FilterSnapshot::from_config(engine.config());
        let handle = engine.spawn()?;
        self.last_state = EngineState::Running;
        self.run = Some(ActiveRun { handle, filters });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Block for the next engine event and apply it. `None` when no run is
    /// active.
    pub fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.run.as_ref()?.handle.recv();
        match event {
            Some(event) => Some(self.apply(event)),
            None => {
                // Worker exited without a completion event.
                self.finish_run();
                None
            }
        }
    }

    /// Apply every event that is already queued, without blocking.
    pub fn pump(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while let Some(event) = self.run.as_ref().and_then(|run| run.handle.try_recv()) {
            let done = matches!(event, EngineEvent::Completion(_));
            applied.push(self.apply(event));
            if done {
                break;
            }
        }
        applied
    }

    /// Consume events until the run completes.
    pub fn wait(&mut self) -> Option<Completion> {
        while self.run.is_some() {
            if let Some(SessionEvent::Completion(completion)) = self.next_event() {
                return Some(completion);
            }
        }
        None
    }

    /// Cancellation handle for the active run, e.g. for a signal handler.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.run.as_ref().map(|run| run.handle.cancel_token())
    }

    /// Cancel the active run, wait for the worker to exit and apply the
    /// events it emitted before stopping.
    pub fn stop(&mut self) -> Result<(), RunError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        let joined = run.handle.stop();
        while let Some(event) = self.run.as_ref().and_then(|run| run.handle.try_recv()) {
            self.apply(event);
        }
        self.finish_run();
        joined
    }

    /// Stop any run and forget the selected file and all evidence.
    pub fn reset(&mut self) -> Result<(), RunError> {
        let stopped = self.stop();
        self.recorder.clear();
        self.video_path = None;
        self.metadata = None;
        self.analysis_rate = INITIAL_RATE.to_string();
        self.last_frame_at = None;
        self.progress = None;
        self.last_state = EngineState::Idle;
        stopped
    }

    pub fn clear_evidence(&mut self) {
        self.recorder.clear();
    }

    /// Write the evidence package. Refused while a run is active.
    pub fn export(&self) -> Result<ExportOutcome, ExportError> {
        if self.is_running() {
            return Err(ExportError::RunActive);
        }
        report::export_package(
            self.recorder.entries(),
            &self.output_root,
            self.metadata.as_ref(),
            &self.analysis_rate,
        )
    }

    pub fn evidence(&self) -> &EvidenceRecorder {
        &self.recorder
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn video_path(&self) -> Option<&str> {
        self.video_path.as_deref()
    }

    pub fn output_root(&self) -> &str {
        &self.output_root
    }

    /// Last instantaneous analysis rate, `"<fps> FPS"`.
    pub fn analysis_rate(&self) -> &str {
        &self.analysis_rate
    }

    /// Fraction of the video read so far, when the frame count is known.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    pub fn state(&self) -> EngineState {
        match &self.run {
            Some(run) => run.handle.state(),
            None => self.last_state,
        }
    }

    fn apply(&mut self, event: EngineEvent) -> SessionEvent {
        match event {
            EngineEvent::Frame(result) => {
                let now = Instant::now();
                if let Some(previous) = self.last_frame_at {
                    let elapsed = now.duration_since(previous).as_secs_f64();
                    let rate = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
                    self.analysis_rate = format!("{:.2} FPS", rate);
                }
                self.last_frame_at = Some(now);
                self.progress = self.frame_count().map(|total| {
                    (result.source_frame_position / total as f64).clamp(0.0, 1.0)
                });

                let logged = match &self.run {
                    Some(run) => self.recorder.on_frame_result(&result, &run.filters),
                    None => false,
                };
                SessionEvent::Frame { result, logged }
            }
            EngineEvent::Completion(completion) => {
                if matches!(completion.state(), EngineState::Completed) {
                    self.progress = Some(1.0);
                }
                log::info!(
                    "run finished in {}; {} evidence frames, analysis rate {}",
                    crate::timecode::format_duration(completion.total_processing_seconds),
                    self.recorder.len(),
                    self.analysis_rate
                );
                self.last_state = completion.state();
                self.finish_run();
                SessionEvent::Completion(completion)
            }
        }
    }

    fn finish_run(&mut self) {
        if let Some(mut run) = self.run.take() {
            if let Err(err) = run.handle.join() {
                log::error!("{}", err);
                self.last_state = EngineState::Failed;
            } else if !self.last_state.is_terminal() {
                self.last_state = run.handle.state();
            }
        }
    }

    fn frame_count(&self) -> Option<u64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("Total Frames"))
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|total| *total > 0)
    }
}
