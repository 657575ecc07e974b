use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::color::ColorFilter;
use crate::detect::classes::DEFAULT_TARGET_CLASSES;
use crate::detect::DetectorSettings;
use crate::engine::{AnalysisConfig, DEFAULT_CONFIDENCE};
use crate::error::ConfigError;
use crate::report::DEFAULT_OUTPUT_ROOT;

const DEFAULT_START_TIME: &str = "00:00:00";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScannerConfigFile {
    output_root: Option<String>,
    detector: Option<DetectorConfigFile>,
    analysis: Option<AnalysisConfigFile>,
    annotation: Option<AnnotationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnalysisConfigFile {
    target_classes: Option<Vec<String>>,
    confidence: Option<f32>,
    frame_skip: Option<u32>,
    color: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnotationConfigFile {
    font_path: Option<PathBuf>,
}

/// Scanner settings: built-in defaults, then the optional file named by
/// `SCANNER_CONFIG`, then `SCANNER_*` environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub output_root: String,
    pub detector: DetectorSettings,
    pub analysis: AnalysisSettings,
    pub label_font: Option<PathBuf>,
}

/// Run defaults as text, before they are resolved into an `AnalysisConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub target_classes: Vec<String>,
    pub confidence: f32,
    pub frame_skip: u32,
    pub color: String,
    pub start_time: String,
    pub end_time: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            target_classes: DEFAULT_TARGET_CLASSES.iter().map(|c| c.to_string()).collect(),
            confidence: DEFAULT_CONFIDENCE,
            frame_skip: 1,
            color: "none".to_string(),
            start_time: DEFAULT_START_TIME.to_string(),
            end_time: None,
        }
    }
}

impl AnalysisSettings {
    /// Resolve names and timecodes into a validated run configuration.
    pub fn to_analysis_config(&self) -> Result<AnalysisConfig, ConfigError> {
        AnalysisConfig::builder()
            .target_class_names(&self.target_classes)?
            .confidence_threshold(self.confidence)
            .frame_skip_factor(self.frame_skip)
            .timecodes(&self.start_time, self.end_time.as_deref())?
            .color_filter(ColorFilter::parse(&self.color))
            .build()
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            output_root: DEFAULT_OUTPUT_ROOT.to_string(),
            detector: DetectorSettings::default(),
            analysis: AnalysisSettings::default(),
            label_font: None,
        }
    }
}

impl ScannerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCANNER_CONFIG").ok();
        let file_cfg = match config_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScannerConfigFile) -> Self {
        let defaults = Self::default();
        let detector_file = file.detector.unwrap_or_default();
        let analysis_file = file.analysis.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file.backend.unwrap_or(defaults.detector.backend),
            model_path: detector_file.model_path,
            input_size: detector_file
                .input_size
                .unwrap_or(defaults.detector.input_size),
        };
        let analysis = AnalysisSettings {
            target_classes: analysis_file
                .target_classes
                .unwrap_or(defaults.analysis.target_classes),
            confidence: analysis_file
                .confidence
                .unwrap_or(defaults.analysis.confidence),
            frame_skip: analysis_file
                .frame_skip
                .unwrap_or(defaults.analysis.frame_skip),
            color: analysis_file.color.unwrap_or(defaults.analysis.color),
            start_time: analysis_file
                .start_time
                .unwrap_or(defaults.analysis.start_time),
            end_time: analysis_file.end_time,
        };
        Self {
            output_root: file.output_root.unwrap_or(defaults.output_root),
            detector,
            analysis,
            label_font: file.annotation.and_then(|a| a.font_path),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(root) = env_value("SCANNER_OUTPUT_ROOT") {
            self.output_root = root;
        }
        if let Some(backend) = env_value("SCANNER_DETECTOR") {
            self.detector.backend = backend;
        }
        if let Some(path) = env_value("SCANNER_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(classes) = env_value("SCANNER_TARGET_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.analysis.target_classes = parsed;
            }
        }
        if let Some(confidence) = env_value("SCANNER_CONFIDENCE") {
            self.analysis.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCANNER_CONFIDENCE must be a number in (0, 1]"))?;
        }
        if let Some(skip) = env_value("SCANNER_FRAME_SKIP") {
            self.analysis.frame_skip = skip
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCANNER_FRAME_SKIP must be a positive integer"))?;
        }
        if let Some(color) = env_value("SCANNER_COLOR") {
            self.analysis.color = color;
        }
        if let Some(font) = env_value("SCANNER_LABEL_FONT") {
            self.label_font = Some(PathBuf::from(font));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_root.trim().is_empty() {
            return Err(anyhow!("output_root must not be empty"));
        }
        if self.detector.backend.trim().is_empty() {
            return Err(anyhow!("detector backend must not be empty"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        self.analysis.to_analysis_config()?;
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ScannerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
