use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::backend::ObjectDetector;
use super::backends::{ColorBlockDetector, StubDetector};

pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Detector selection, as read from configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: "stub".to_string(),
            model_path: None,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

/// Backends compiled into this build.
pub fn available_backends() -> Vec<&'static str> {
    let mut names = vec!["stub", "blocks"];
    if cfg!(feature = "backend-tract") {
        names.push("tract");
    }
    names
}

/// Construct the configured backend.
pub fn create_detector(settings: &DetectorSettings) -> Result<Box<dyn ObjectDetector>> {
    let backend = settings.backend.trim().to_lowercase();
    match backend.as_str() {
        "stub" => Ok(Box::new(StubDetector::new())),
        "blocks" => Ok(Box::new(ColorBlockDetector::default())),
        "tract" => create_tract(settings),
        other => Err(anyhow!(
            "detector backend '{}' not available (choose one of: {})",
            other,
            available_backends().join(", ")
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn create_tract(settings: &DetectorSettings) -> Result<Box<dyn ObjectDetector>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract backend requires a model path"))?;
    Ok(Box::new(super::backends::TractDetector::new(
        model_path,
        settings.input_size,
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn create_tract(_settings: &DetectorSettings) -> Result<Box<dyn ObjectDetector>> {
    Err(anyhow!(
        "the tract backend requires the backend-tract feature"
    ))
}
