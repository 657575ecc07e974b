use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use evidence_scanner::config::ScannerConfig;
use evidence_scanner::ColorFilter;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SCANNER_CONFIG",
        "SCANNER_OUTPUT_ROOT",
        "SCANNER_DETECTOR",
        "SCANNER_MODEL_PATH",
        "SCANNER_TARGET_CLASSES",
        "SCANNER_CONFIDENCE",
        "SCANNER_FRAME_SKIP",
        "SCANNER_COLOR",
        "SCANNER_LABEL_FONT",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "output_root": "case_4711",
        "detector": { "backend": "blocks", "input_size": 320 },
        "analysis": {
            "target_classes": ["car", "truck"],
            "confidence": 0.5,
            "frame_skip": 4,
            "color": "white",
            "start_time": "0:01:00",
            "end_time": "0:05:00"
        },
        "annotation": { "font_path": "/usr/share/fonts/label.ttf" }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("SCANNER_CONFIG", file.path());
    std::env::set_var("SCANNER_FRAME_SKIP", "2");
    std::env::set_var("SCANNER_TARGET_CLASSES", "person, bus");

    let cfg = ScannerConfig::load().expect("load config");
    assert_eq!(cfg.output_root, "case_4711");
    assert_eq!(cfg.detector.backend, "blocks");
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.analysis.confidence, 0.5);
    assert_eq!(cfg.analysis.frame_skip, 2);
    assert_eq!(cfg.analysis.target_classes, vec!["person", "bus"]);
    assert_eq!(
        cfg.label_font,
        Some(PathBuf::from("/usr/share/fonts/label.ttf"))
    );

    let analysis = cfg.analysis.to_analysis_config().unwrap();
    assert_eq!(analysis.target_class_names(), "person, bus");
    assert_eq!(analysis.frame_skip_factor(), 2);
    assert_eq!(analysis.start_second(), 60.0);
    assert_eq!(analysis.end_second(), Some(300.0));
    assert_eq!(analysis.color_filter(), &ColorFilter::parse("white"));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
output_root = "toml_out"

[detector]
backend = "stub"

[analysis]
confidence = 0.3
color = "none"
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("SCANNER_CONFIG", file.path());

    let cfg = ScannerConfig::load().expect("load config");
    assert_eq!(cfg.output_root, "toml_out");
    assert_eq!(cfg.analysis.confidence, 0.3);
    assert_eq!(cfg.analysis.frame_skip, 1);
    assert!(cfg.analysis.end_time.is_none());
    let analysis = cfg.analysis.to_analysis_config().unwrap();
    assert!(analysis.color_filter().is_disabled());
    assert_eq!(analysis.end_second(), None);

    clear_env();
}

#[test]
fn defaults_apply_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ScannerConfig::load().expect("load defaults");
    assert_eq!(cfg, ScannerConfig::default());
    assert_eq!(cfg.output_root, "video_analysis_output");
    assert_eq!(
        cfg.analysis.target_classes,
        vec!["person", "bicycle", "car", "truck", "bus"]
    );

    clear_env();
}

#[test]
fn unknown_fields_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"analysis": {"confidance": 0.5}}"#)
        .expect("write config");
    std::env::set_var("SCANNER_CONFIG", file.path());
    assert!(ScannerConfig::load().is_err());

    clear_env();
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SCANNER_CONFIDENCE", "high");
    assert!(ScannerConfig::load().is_err());
    clear_env();

    std::env::set_var("SCANNER_CONFIDENCE", "1.5");
    assert!(ScannerConfig::load().is_err());
    clear_env();

    std::env::set_var("SCANNER_FRAME_SKIP", "0");
    assert!(ScannerConfig::load().is_err());
    clear_env();

    std::env::set_var("SCANNER_TARGET_CLASSES", "person,helicopter");
    assert!(ScannerConfig::load().is_err());

    clear_env();
}

#[test]
fn inverted_time_range_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"analysis": {"start_time": "0:02:00", "end_time": "0:01:00"}}"#)
        .expect("write config");
    std::env::set_var("SCANNER_CONFIG", file.path());
    let err = ScannerConfig::load().unwrap_err();
    assert!(format!("{:#}", err).contains("time range"));

    clear_env();
}
