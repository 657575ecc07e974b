//! Video analysis engine.
//!
//! The engine is the producer side of a run: it opens the video, seeks to the
//! configured start, reads frames in order, runs the detector on sampled
//! frames, validates and annotates detections, and emits one
//! `EngineEvent::Frame` per processed frame followed by exactly one
//! `EngineEvent::Completion`.
//!
//! `VideoAnalysisEngine::spawn` moves the run onto a dedicated worker thread
//! and returns an `EngineHandle` that receives events over a channel.
//! Cancellation is cooperative and observed once per frame boundary; joining
//! the handle guarantees the decoder and detector have been released.

mod config;
mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

pub use config::{parse_time_range, AnalysisConfig, AnalysisConfigBuilder, DEFAULT_CONFIDENCE};
pub use events::{Completion, EngineEvent, FrameResult, RunOutcome};

use crate::detect::ObjectDetector;
use crate::error::RunError;
use crate::filter::{Annotator, DetectionFilterPipeline};
use crate::ingest::{FileSource, FrameSource};
use crate::timecode::{format_timecode, frame_time_seconds};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineState::Completed | EngineState::Cancelled | EngineState::Failed
        )
    }
}

/// Cooperative cancellation flag shared between the owner and the worker.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
struct SharedState(Arc<Mutex<EngineState>>);

impl SharedState {
    fn new(state: EngineState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    fn get(&self) -> EngineState {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, state: EngineState) {
        match self.0.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

/// Opens the decoder for a run. Called on the worker thread.
pub type SourceOpener = Box<dyn FnOnce(&str) -> Result<Box<dyn FrameSource>> + Send>;

pub struct VideoAnalysisEngine {
    video_path: String,
    config: AnalysisConfig,
    detector: Box<dyn ObjectDetector>,
    pipeline: DetectionFilterPipeline,
    opener: SourceOpener,
}

impl VideoAnalysisEngine {
    pub fn new(
        video_path: impl Into<String>,
        config: AnalysisConfig,
        detector: Box<dyn ObjectDetector>,
    ) -> Self {
        let pipeline = DetectionFilterPipeline::new(config.color_filter().clone());
        Self {
            video_path: video_path.into(),
            config,
            detector,
            pipeline,
            opener: Box::new(|path: &str| {
                let source: Box<dyn FrameSource> = Box::new(FileSource::open(path)?);
                Ok(source)
            }),
        }
    }

    /// Replace the default `FileSource` decoder.
    pub fn with_source_opener<F>(mut self, opener: F) -> Self
    where
        F: FnOnce(&str) -> Result<Box<dyn FrameSource>> + Send + 'static,
    {
        self.opener = Box::new(opener);
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.pipeline = self.pipeline.with_annotator(annotator);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run on the current thread, handing every event to `emit`.
    ///
    /// `emit` returns `false` when the consumer has gone away; the run then
    /// stops as if cancelled.
    pub fn run_blocking<F>(self, cancel: &CancelToken, mut emit: F) -> EngineState
    where
        F: FnMut(EngineEvent) -> bool,
    {
        let state = SharedState::new(EngineState::Idle);
        self.run(cancel, &state, &mut emit);
        state.get()
    }

    /// Start the run on a worker thread.
    pub fn spawn(self) -> Result<EngineHandle> {
        let cancel = CancelToken::new();
        let state = SharedState::new(EngineState::Running);
        let (tx, rx) = mpsc::channel();

        let cancel_thread = cancel.clone();
        let state_thread = state.clone();
        let join = std::thread::Builder::new()
            .name("video-analysis".to_string())
            .spawn(move || {
                let mut emit = |event: EngineEvent| tx.send(event).is_ok();
                self.run(&cancel_thread, &state_thread, &mut emit);
            })
            .context("failed to spawn analysis worker")?;

        Ok(EngineHandle {
            cancel,
            state,
            events: rx,
            join: Some(join),
        })
    }

    fn run(
        self,
        cancel: &CancelToken,
        state: &SharedState,
        emit: &mut dyn FnMut(EngineEvent) -> bool,
    ) {
        let Self {
            video_path,
            config,
            mut detector,
            pipeline,
            opener,
        } = self;
        let started = Instant::now();
        state.set(EngineState::Running);

        let mut source = match open_source(opener, &video_path) {
            Ok(source) => source,
            Err(err) => {
                log::error!("{}", err);
                finish(
                    state,
                    emit,
                    Completion {
                        total_processing_seconds: started.elapsed().as_secs_f64(),
                        outcome: RunOutcome::Failed(err),
                        frames_read: 0,
                        frames_emitted: 0,
                        inference_failures: 0,
                    },
                );
                return;
            }
        };
        let fps = source.fps();
        let (width, height) = source.dimensions();
        log::info!(
            "analysis started: {} ({}x{} @ {:.2} fps, {} frames, detector {})",
            video_path,
            width,
            height,
            fps,
            source.frame_count(),
            detector.name()
        );

        let mut frame_counter: u64 = 0;
        if config.start_second() > 0.0 {
            let target = (config.start_second() * fps).floor() as u64;
            let total = source.frame_count();
            if total > 0 && target >= total {
                drop(source);
                log::info!(
                    "start {} is past the end of the video ({} frames); nothing to analyse",
                    format_timecode(config.start_second()),
                    total
                );
                finish(
                    state,
                    emit,
                    Completion {
                        total_processing_seconds: started.elapsed().as_secs_f64(),
                        outcome: RunOutcome::Completed,
                        frames_read: 0,
                        frames_emitted: 0,
                        inference_failures: 0,
                    },
                );
                return;
            }
            if let Err(err) = source.seek_to_frame(target) {
                drop(source);
                let err = RunError::SourceUnreadable {
                    path: video_path.clone(),
                    reason: format!("{:#}", err),
                };
                log::error!("{}", err);
                finish(
                    state,
                    emit,
                    Completion {
                        total_processing_seconds: started.elapsed().as_secs_f64(),
                        outcome: RunOutcome::Failed(err),
                        frames_read: 0,
                        frames_emitted: 0,
                        inference_failures: 0,
                    },
                );
                return;
            }
            // The first increment after the seek lands on the target frame.
            frame_counter = target.max(1) - 1;
            log::info!(
                "seeked to frame {} ({})",
                target,
                format_timecode(config.start_second())
            );
        }

        if let Err(err) = detector.warm_up() {
            log::warn!("detector warm-up failed: {:#}", err);
        }

        let skip = u64::from(config.frame_skip_factor());
        let mut frames_read: u64 = 0;
        let mut frames_emitted: u64 = 0;
        let mut inference_failures: u64 = 0;
        let mut outcome = RunOutcome::Completed;

        loop {
            if cancel.is_cancelled() {
                log::info!("analysis cancelled after {} frames", frames_read);
                outcome = RunOutcome::Cancelled;
                break;
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("frame read failed, ending run: {:#}", err);
                    break;
                }
            };
            frames_read += 1;
            frame_counter += 1;
            let position = source.position();

            // (position - 1) / fps: the frame just read, not the next one.
            let frame_time = frame_time_seconds(position, fps);
            if let Some(end) = config.end_second() {
                if frame_time > end {
                    log::info!("end time {} reached", format_timecode(end));
                    break;
                }
            }

            if skip > 1 && frame_counter % skip != 0 {
                continue;
            }

            let raw = match detector.predict(
                &frame,
                config.confidence_threshold(),
                config.target_class_ids(),
            ) {
                Ok(raw) => raw,
                Err(err) => {
                    inference_failures += 1;
                    log::warn!("inference failed on frame {}: {:#}", frame_counter, err);
                    continue;
                }
            };
            let output = pipeline.filter(&frame, raw, |id| detector.class_name(id));
            let result = FrameResult {
                annotated_frame: output.annotated,
                validated_detection_count: output.detections.len(),
                detections: output.detections,
                frame_index: frame_counter,
                source_frame_position: position,
                video_fps: fps,
            };
            if !emit(EngineEvent::Frame(Box::new(result))) {
                log::info!("event consumer disconnected; stopping analysis");
                outcome = RunOutcome::Cancelled;
                break;
            }
            frames_emitted += 1;
        }

        drop(source);
        let completion = Completion {
            total_processing_seconds: started.elapsed().as_secs_f64(),
            outcome,
            frames_read,
            frames_emitted,
            inference_failures,
        };
        log::info!(
            "analysis finished ({:?}): {} frames read, {} emitted, {} inference failures in {:.2}s",
            completion.state(),
            completion.frames_read,
            completion.frames_emitted,
            completion.inference_failures,
            completion.total_processing_seconds
        );
        finish(state, emit, completion);
    }
}

fn open_source(opener: SourceOpener, path: &str) -> Result<Box<dyn FrameSource>, RunError> {
    let unreadable = |reason: String| RunError::SourceUnreadable {
        path: path.to_string(),
        reason,
    };
    let source = opener(path).map_err(|err| unreadable(format!("{:#}", err)))?;
    let fps = source.fps();
    if !fps.is_finite() || fps <= 0.0 {
        return Err(unreadable(format!("invalid frame rate {}", fps)));
    }
    Ok(source)
}

fn finish(state: &SharedState, emit: &mut dyn FnMut(EngineEvent) -> bool, completion: Completion) {
    let terminal = completion.state();
    state.set(terminal);
    // Nobody may be listening any more; the state still records the outcome.
    let _ = emit(EngineEvent::Completion(completion));
}

/// Owner side of a spawned run.
///
/// Dropping the handle cancels the run and waits for the worker to exit.
pub struct EngineHandle {
    cancel: CancelToken,
    state: SharedState,
    events: Receiver<EngineEvent>,
    join: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Request cooperative cancellation. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Block for the next event. `None` once the worker has exited and all
    /// events were consumed.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.events.recv().ok()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Wait for the worker to exit. Events not yet received stay queued.
    pub fn join(&mut self) -> Result<(), RunError> {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                self.state.set(EngineState::Failed);
                return Err(RunError::WorkerPanicked);
            }
        }
        Ok(())
    }

    /// Cancel and wait for the worker to exit.
    pub fn stop(&mut self) -> Result<(), RunError> {
        self.cancel();
        self.join()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.cancel();
            if let Err(err) = self.join() {
                log::error!("{}", err);
            }
        }
    }
}
