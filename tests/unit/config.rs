use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = EngineConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.default_fps, 30.0);
    assert_eq!(cfg.boundary_tolerance_frames, 1.0);
    assert_eq!(cfg.platform, PlatformSetting::Auto);
}

#[test]
fn partial_json_fills_defaults() {
    let cfg = EngineConfig::from_json_str(r#"{"default_fps": 25, "platform": "linux"}"#).unwrap();
    assert_eq!(cfg.default_fps, 25.0);
    assert_eq!(cfg.platform(), PlatformType::Linux);
    assert_eq!(cfg.max_fps, 1000.0);

    let empty = EngineConfig::from_json_str("{}").unwrap();
    assert_eq!(empty, EngineConfig::default());
}

#[test]
fn invalid_values_are_rejected() {
    assert!(matches!(
        EngineConfig::from_json_str(r#"{"default_fps": 0}"#),
        Err(TimegridError::InvalidArgument(_))
    ));
    assert!(EngineConfig::from_json_str(r#"{"drift_threshold_frames": -1}"#).is_err());
    assert!(EngineConfig::from_json_str(r#"{"lenient_snap_fraction": 0.9}"#).is_err());
    assert!(matches!(
        EngineConfig::from_json_str(r#"{"platform": "beos"}"#),
        Err(TimegridError::Serde(_))
    ));
}

#[test]
fn load_reports_missing_file() {
    let err = EngineConfig::load(Path::new("definitely/not/here.json")).unwrap_err();
    assert!(err.to_string().contains("read config"));
}
