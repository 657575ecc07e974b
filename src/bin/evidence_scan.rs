//! evidence_scan - scan a recorded video for target objects
//!
//! This tool:
//! 1. Loads configuration (SCANNER_CONFIG file, SCANNER_* env, flags)
//! 2. Probes the video and runs the analysis engine on a worker thread
//! 3. Exports the evidence package when matching frames were found
//!
//! Ctrl-C cancels the run cooperatively; evidence gathered so far is still
//! exported.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use evidence_scanner::config::ScannerConfig;
use evidence_scanner::detect::{available_backends, create_detector};
use evidence_scanner::timecode::format_duration;
use evidence_scanner::{Annotator, ExportOutcome, RunOutcome, Session, SessionEvent};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "evidence_scan",
    about = "Scan a video for target objects and export an evidence package"
)]
struct Args {
    /// Video file to scan (or a stub:// synthetic source)
    #[arg(value_name = "VIDEO")]
    video: String,

    /// Comma-separated target classes (person, bicycle, car, motorcycle, bus, truck)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    classes: Option<Vec<String>>,

    /// Minimum detector confidence, in (0, 1]
    #[arg(long)]
    confidence: Option<f32>,

    /// Process one of every N frames
    #[arg(long, value_name = "N")]
    frame_skip: Option<u32>,

    /// Start time (H:MM:SS)
    #[arg(long, value_name = "TIME")]
    start: Option<String>,

    /// End time (H:MM:SS); defaults to the end of the video
    #[arg(long, value_name = "TIME")]
    end: Option<String>,

    /// Dominant colour filter (white, black, red, blue, green, yellow, none)
    #[arg(long)]
    color: Option<String>,

    /// Output root for evidence packages
    #[arg(long, value_name = "DIR")]
    output: Option<String>,

    /// Detector backend
    #[arg(long)]
    detector: Option<String>,

    /// ONNX model path for the tract backend
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// TrueType font for box labels
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Analyse only; do not write an evidence package
    #[arg(long)]
    no_export: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = ScannerConfig::load()?;
    apply_args(&mut cfg, &args);
    cfg.validate()?;
    let analysis = cfg.analysis.to_analysis_config()?;

    let detector = {
        let _step = ui.step("Load detector");
        create_detector(&cfg.detector).with_context(|| {
            format!("available backends: {}", available_backends().join(", "))
        })?
    };
    let annotator = Annotator::discover(cfg.label_font.as_deref());
    let mut session = Session::new(cfg.output_root.clone()).with_annotator(annotator);

    let total_frames = {
        let _step = ui.step("Open video");
        let metadata = session.select_file(&args.video)?;
        for (key, value) in metadata.pairs() {
            log::info!("{}: {}", key, value);
        }
        metadata
            .get("Total Frames")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    log::info!(
        "targets: {}; confidence {:.2}; frame skip {}; {} to {}; colour {}",
        analysis.target_class_names(),
        analysis.confidence_threshold(),
        analysis.frame_skip_factor(),
        analysis.start_timecode(),
        analysis.end_timecode(),
        analysis.color_filter()
    );
    session.start_run(analysis, detector)?;

    let cancel = session
        .cancel_token()
        .ok_or_else(|| anyhow!("analysis did not start"))?;
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .context("error setting Ctrl-C handler")?;

    let progress = ui.frames(total_frames);
    let completion = loop {
        match session.next_event() {
            Some(SessionEvent::Frame { result, .. }) => {
                progress.update(
                    result.source_frame_position as u64,
                    session.evidence().len(),
                    session.analysis_rate(),
                );
            }
            Some(SessionEvent::Completion(completion)) => break completion,
            None => return Err(anyhow!("analysis worker exited without completing")),
        }
    };
    progress.finish(&format!(
        "{} frames processed, {} evidence frames",
        completion.frames_emitted,
        session.evidence().len()
    ));

    match completion.outcome {
        RunOutcome::Failed(err) => return Err(err.into()),
        RunOutcome::Cancelled => log::warn!("analysis cancelled; keeping evidence gathered so far"),
        RunOutcome::Completed => {}
    }
    if completion.inference_failures > 0 {
        log::warn!(
            "{} frames skipped after inference failures",
            completion.inference_failures
        );
    }

    println!(
        "Total Processing Time: {}",
        format_duration(completion.total_processing_seconds)
    );
    println!("Analysis Rate: {}", session.analysis_rate());
    println!("Total Evidence Frames: {}", session.evidence().len());

    if args.no_export {
        return Ok(());
    }
    if session.evidence().is_empty() {
        println!("No evidence found; nothing to export.");
        return Ok(());
    }

    let outcome = {
        let _step = ui.step("Export evidence package");
        session.export()?
    };
    match &outcome {
        ExportOutcome::Complete { output_dir, .. } => {
            println!("Evidence package saved to {}", output_dir.display());
        }
        ExportOutcome::Partial {
            output_dir,
            metadata_error,
            ..
        } => {
            eprintln!(
                "warning: report and {} frames saved to {}, but {}",
                outcome.frames_written(),
                output_dir.display(),
                metadata_error
            );
        }
    }
    Ok(())
}

fn apply_args(cfg: &mut ScannerConfig, args: &Args) {
    if let Some(classes) = &args.classes {
        cfg.analysis.target_classes = classes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }
    if let Some(confidence) = args.confidence {
        cfg.analysis.confidence = confidence;
    }
    if let Some(skip) = args.frame_skip {
        cfg.analysis.frame_skip = skip;
    }
    if let Some(start) = &args.start {
        cfg.analysis.start_time = start.clone();
    }
    if let Some(end) = &args.end {
        cfg.analysis.end_time = Some(end.clone());
    }
    if let Some(color) = &args.color {
        cfg.analysis.color = color.clone();
    }
    if let Some(output) = &args.output {
        cfg.output_root = output.clone();
    }
    if let Some(detector) = &args.detector {
        cfg.detector.backend = detector.clone();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    if let Some(font) = &args.font {
        cfg.label_font = Some(font.clone());
    }
}
