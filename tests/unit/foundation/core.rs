use super::*;

#[test]
fn rounding_methods_are_distinct_on_fractions() {
    assert_eq!(RoundingMethod::Round.apply(37.5), 38);
    assert_eq!(RoundingMethod::Floor.apply(37.5), 37);
    assert_eq!(RoundingMethod::Ceil.apply(37.2), 38);
    assert_eq!(RoundingMethod::Round.apply(37.49), 37);
}

#[test]
fn rounding_is_identity_on_integers() {
    for m in [
        RoundingMethod::Round,
        RoundingMethod::Floor,
        RoundingMethod::Ceil,
    ] {
        assert_eq!(m.apply(45.0), 45);
    }
}

#[test]
fn fps_validation_rejects_non_positive_and_nan() {
    assert!(ensure_fps(30.0).is_ok());
    assert!(ensure_fps(0.0).is_err());
    assert!(ensure_fps(-24.0).is_err());
    assert!(ensure_fps(f64::NAN).is_err());
    assert!(ensure_fps(f64::INFINITY).is_err());
}

#[test]
fn non_negative_validation_names_the_field() {
    let err = ensure_non_negative("seconds", -1.0).unwrap_err();
    assert!(err.to_string().contains("seconds"));
    assert!(ensure_non_negative("seconds", 0.0).is_ok());
}

#[test]
fn rounding_method_serde_is_lowercase() {
    let s = serde_json::to_string(&RoundingMethod::Floor).unwrap();
    assert_eq!(s, "\"floor\"");
    let m: RoundingMethod = serde_json::from_str("\"ceil\"").unwrap();
    assert_eq!(m, RoundingMethod::Ceil);
}
