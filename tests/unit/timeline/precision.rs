use super::*;
use crate::timeline::model::{Clip, Track, TrackItem, TrackKind};

/// Deterministic xorshift64 in `[0, 1)`.
struct Rng(u64);

impl Rng {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[test]
fn rounding_error_nudges_one_frame_toward_original() {
    assert_eq!(compensate_rounding_error(1.0, 30, 30.0).unwrap(), 30);
    assert_eq!(compensate_rounding_error(1.0, 32, 30.0).unwrap(), 31);
    assert_eq!(compensate_rounding_error(1.0, 28, 30.0).unwrap(), 29);
    // Exactly half a frame away is acceptable.
    assert_eq!(compensate_rounding_error(1.5, 37, 25.0).unwrap(), 37);
}

#[test]
fn rounding_error_rejects_bad_input() {
    assert!(matches!(
        compensate_rounding_error(-1.0, 0, 30.0),
        Err(TimegridError::InvalidArgument(_))
    ));
    assert!(compensate_rounding_error(1.0, -1, 30.0).is_err());
    assert!(compensate_rounding_error(1.0, 30, 0.0).is_err());
}

#[test]
fn accumulated_error_of_clean_sequence_is_untouched() {
    let ts: Vec<f64> = (0..10).map(|i| i as f64 / 25.0).collect();
    let out = compensate_accumulated_error(&ts, 25.0, 0.5).unwrap();
    for (a, b) in ts.iter().zip(&out) {
        assert!((a - b).abs() < 1e-12);
    }
    assert!(compensate_accumulated_error(&[], 25.0, 0.5).unwrap().is_empty());
}

#[test]
fn accumulated_error_snaps_back_once_residual_exceeds_threshold() {
    // Every interval is 0.4 frame too long at 10 fps; drift passes half a frame
    // on the second step and is pulled back by a whole frame.
    let ts = [0.0, 0.14, 0.28, 0.42];
    let out = compensate_accumulated_error(&ts, 10.0, 0.5).unwrap();
    assert!((out[1] - 0.14).abs() < 1e-12);
    assert!((out[2] - 0.18).abs() < 1e-12);
    assert!((out[3] - 0.32).abs() < 1e-12);
}

#[test]
fn accumulated_error_rejects_negative_timestamps() {
    assert!(compensate_accumulated_error(&[0.0, -0.1], 30.0, 0.5).is_err());
    assert!(compensate_accumulated_error(&[0.0, 0.1], 30.0, -0.5).is_err());
}

#[test]
fn drift_stays_bounded_over_long_jittered_sequence() {
    let fps = 30.0;
    let frame = 1.0 / fps;
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let mut ts = Vec::with_capacity(10_000);
    let mut t = 2.0;
    for _ in 0..10_000 {
        ts.push(t);
        t += frame + (rng.next_f64() * 2.0 - 1.0) * 0.002;
    }

    for threshold in [0.5, 0.25, 1.0] {
        let out = compensate_accumulated_error(&ts, fps, threshold).unwrap();
        assert_eq!(out.len(), ts.len());
        let mut ideal = ts[0];
        let mut worst: f64 = (out[0] - ideal).abs();
        for i in 1..ts.len() {
            ideal += ((ts[i] - ts[i - 1]) / frame).round() * frame;
            worst = worst.max((out[i] - ideal).abs());
        }
        assert!(
            worst <= threshold * frame + 1e-9,
            "threshold {threshold}: drift {worst}"
        );
    }
}

#[test]
fn grid_alignment_strict_and_lenient() {
    let pc = PrecisionCompensator::default();
    let times = [1.0005, 1.01, 2.0];

    let strict = pc.align_keyframes_to_grid(&times, 30.0, true).unwrap();
    assert!((strict[0] - 1.0).abs() < 1e-12);
    assert!((strict[1] - 1.0).abs() < 1e-12);

    let lenient = pc.align_keyframes_to_grid(&times, 30.0, false).unwrap();
    assert!((lenient[0] - 1.0).abs() < 1e-12);
    assert_eq!(lenient[1], 1.01);
    assert!((lenient[2] - 2.0).abs() < 1e-12);

    assert!(pc.align_keyframes_to_grid(&[-1.0], 30.0, true).is_err());
}

#[test]
fn correction_rounds_frames_and_rewrites_times() {
    let mut tl = Timeline::new(24.0);
    tl.clips.push(Clip::new(24.4, 71.6));
    let mut item = TrackItem::new(0.0, 12.0);
    item.span.start_time = Some(0.3);
    tl.tracks.push(Track::new(TrackKind::Video, vec![item]));
    tl.keypoints = Some(vec![0.0, 0.5, 1.0]);

    let out = PrecisionCompensator::default()
        .correct_timeline_precision(&tl, 24.0)
        .unwrap();
    let clip = &out.clips[0].span;
    assert_eq!((clip.start_frame, clip.end_frame), (24.0, 72.0));
    assert_eq!(clip.start_time, Some(1.0));
    assert_eq!(clip.end_time, Some(3.0));
    assert_eq!(clip.duration, Some(2.0));

    let item = &out.tracks[0].items[0].span;
    assert_eq!(item.start_time, Some(0.0));
    assert_eq!(item.duration, Some(0.5));
    assert_eq!(out.keypoints.as_deref(), Some(&[0.0, 0.5, 1.0][..]));

    // Input is left alone.
    assert_eq!(tl.clips[0].span.start_frame, 24.4);
}

#[test]
fn analysis_flags_fractional_frames_and_time_mismatches() {
    let fps = 24.0;
    let mut tl = Timeline::new(fps);
    tl.clips.push(Clip::new(10.5, 20.0));

    let mut off_by_frames = Clip::with_times(24.0, 48.0, fps);
    off_by_frames.span.start_time = Some(1.5);
    tl.clips.push(off_by_frames);

    let mut item = TrackItem::with_times(0.0, 24.0, fps);
    item.span.end_time = Some(1.0 + 0.5 / fps);
    tl.tracks.push(Track::new(TrackKind::Audio, vec![item]));

    let issues = PrecisionCompensator::default()
        .analyze_precision_issues(&tl, fps)
        .unwrap();

    let frac = issues
        .iter()
        .find(|i| i.location == IssueLocation::Clip { index: 0 })
        .unwrap();
    assert_eq!(frac.field, "start_frame");
    assert_eq!(frac.severity, Severity::Warning);

    let big = issues
        .iter()
        .find(|i| i.location == IssueLocation::Clip { index: 1 })
        .unwrap();
    assert_eq!(big.field, "start_time");
    assert_eq!(big.severity, Severity::Error);
    assert_eq!(big.expected, 1.0);

    let half = issues
        .iter()
        .find(|i| i.location == IssueLocation::TrackItem { track: 0, item: 0 })
        .unwrap();
    assert_eq!(half.field, "end_time");
    assert_eq!(half.severity, Severity::Warning);

    assert_eq!(issues.len(), 3);
}

#[test]
fn clean_timeline_has_no_precision_issues() {
    let mut tl = Timeline::new(30.0);
    tl.clips.push(Clip::with_times(0.0, 30.0, 30.0));
    tl.clips.push(Clip::new(30.0, 60.0));
    let issues = PrecisionCompensator::default()
        .analyze_precision_issues(&tl, 30.0)
        .unwrap();
    assert!(issues.is_empty());
}
