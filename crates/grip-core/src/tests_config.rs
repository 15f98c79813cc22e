use std::io::Write;

use crate::*;

#[test]
fn rendered_template_parses_back() {
    let mut cfg = GripConfig::default();
    cfg.fusion.policy = NormalizationPolicy::TwoPoint;
    cfg.calibration.adaptation = BaselineAdaptation::WhileAtRest;
    cfg.output.curve = 2.0;
    let text = cfg.to_toml_string().unwrap();
    assert!(text.contains("policy = \"two_point\""));
    assert!(text.contains("adaptation = \"while_at_rest\""));
    assert_eq!(GripConfig::from_toml_str(&text).unwrap(), cfg);
}

#[test]
fn partial_toml_keeps_defaults() {
    let cfg = GripConfig::from_toml_str(
        r#"
        [window]
        sample_rate_hint = 100

        [fusion.weights]
        touch = 0.0
        "#,
    )
    .unwrap();
    assert_eq!(cfg.window.sample_rate_hint, 100);
    assert_eq!(cfg.window.window_seconds, 1.0);
    assert_eq!(cfg.window_capacity(), 100);
    assert_eq!(cfg.fusion.weights.touch, 0.0);
    assert_eq!(cfg.fusion.weights.magnetic, 1.0);
    assert_eq!(cfg.output, OutputConfig::default());
}

#[test]
fn invalid_toml_values_are_rejected() {
    let err = GripConfig::from_toml_str("[motion]\nalpha = 1.5\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "motion.alpha", .. }));

    let err = GripConfig::from_toml_str("[output]\ncurve = \"steep\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[calibration]\nduration_seconds = 2.5\n\n[output]\ndead_zone = 0.1\nstrong_threshold = 80.0"
    )
    .unwrap();

    let cfg = GripConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.calibration_ms(), 2500);
    assert_eq!(cfg.output.dead_zone, 0.1);
    assert_eq!(cfg.output.strong_threshold, 80.0);
    assert_eq!(cfg.motion, MotionConfig::default());
}

#[test]
fn file_with_invalid_values_fails_validation() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[sensors]\ndead_after_invalid_ticks = 0").unwrap();
    assert!(matches!(
        GripConfig::from_file(file.path()),
        Err(ConfigError::Invalid { field: "sensors.dead_after_invalid_ticks", .. })
    ));
}

#[test]
fn missing_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GripConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn engine_refuses_invalid_config() {
    let mut cfg = GripConfig::default();
    cfg.window.sample_rate_hint = 0;
    assert!(GripEngine::new(cfg).is_err());
}

#[test]
fn oversized_windows_are_rejected() {
    let mut cfg = GripConfig::default();
    cfg.window.sample_rate_hint = 1000;
    cfg.window.window_seconds = 65.536;
    cfg.validate().unwrap();
    assert_eq!(cfg.window_capacity(), MAX_CAPACITY);

    cfg.window.window_seconds = 1.0e6;
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::Invalid { field: "window.window_seconds", .. })
    ));

    cfg.window.sample_rate_hint = u32::MAX;
    cfg.window.window_seconds = f32::MAX;
    assert!(GripEngine::new(cfg).is_err());
}
