//! Rounding and drift compensation on the frame grid.

use crate::config::EngineConfig;
use crate::foundation::core::{FRAME_EPSILON, ensure_fps, ensure_non_negative, frame_duration};
use crate::foundation::error::{TimegridError, TimegridResult};
use crate::timeline::model::{Span, Timeline};

/// Fraction of a frame beyond which a frame/time mismatch is reported.
const MISMATCH_REPORT_FRACTION: f64 = 0.1;

/// Nudge `converted_frames` by one frame toward `original_seconds` when a single
/// conversion's rounding left it more than half a frame away.
pub fn compensate_rounding_error(
    original_seconds: f64,
    converted_frames: i64,
    fps: f64,
) -> TimegridResult<i64> {
    let original = ensure_non_negative("original_seconds", original_seconds)?;
    let fps = ensure_fps(fps)?;
    if converted_frames < 0 {
        return Err(TimegridError::invalid_argument(format!(
            "converted_frames must be >= 0, got {converted_frames}"
        )));
    }
    let error = original - converted_frames as f64 / fps;
    if error.abs() <= 0.5 / fps + FRAME_EPSILON {
        Ok(converted_frames)
    } else if error > 0.0 {
        Ok(converted_frames + 1)
    } else {
        // error < 0 with original >= 0 implies converted_frames >= 1.
        Ok(converted_frames - 1)
    }
}

/// Keep the cumulative drift of a timestamp sequence within `threshold` frames.
///
/// Each interval is compared with its whole-frame ideal and the difference is
/// accumulated. When the running residual exceeds `threshold` frame durations,
/// the current timestamp (and everything after it) is shifted back by the
/// whole-frame part of the residual; a remainder that is still above the
/// threshold is absorbed as well, otherwise it carries forward.
///
/// At every index the output differs from the ideal grid position
/// (`first + sum of whole-frame intervals`) by at most `threshold` frames,
/// however long the sequence is.
pub fn compensate_accumulated_error(
    timestamps: &[f64],
    fps: f64,
    threshold: f64,
) -> TimegridResult<Vec<f64>> {
    let fps = ensure_fps(fps)?;
    let threshold = ensure_non_negative("threshold", threshold)?;
    for &t in timestamps {
        ensure_non_negative("timestamp", t)?;
    }

    let frame = frame_duration(fps);
    let limit = threshold * frame;
    let mut out = Vec::with_capacity(timestamps.len());
    let Some(&first) = timestamps.first() else {
        return Ok(out);
    };
    out.push(first);

    let mut residual = 0.0;
    let mut shift_total = 0.0;
    for pair in timestamps.windows(2) {
        let actual = pair[1] - pair[0];
        let ideal = (actual / frame).round() * frame;
        residual += actual - ideal;

        if residual.abs() > limit {
            let whole = (residual / frame).round() * frame;
            let shift = if (residual - whole).abs() > limit {
                residual
            } else {
                whole
            };
            shift_total += shift;
            residual -= shift;
        }
        out.push(pair[1] - shift_total);
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// How serious a precision finding is.
pub enum Severity {
    /// Cosmetic or sub-frame; exporters will still place the item correctly.
    Warning,
    /// Off by a frame or more.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Where a finding was made.
pub enum IssueLocation {
    /// `timeline.clips[index]`.
    Clip {
        /// Clip index.
        index: usize,
    },
    /// `timeline.tracks[track].items[item]`.
    TrackItem {
        /// Track index.
        track: usize,
        /// Item index within the track.
        item: usize,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// One finding of [`PrecisionCompensator::analyze_precision_issues`].
pub struct PrecisionIssue {
    /// Clip or item the finding refers to.
    pub location: IssueLocation,
    /// Field name, e.g. `"start_frame"`.
    pub field: String,
    /// Severity.
    pub severity: Severity,
    /// Observed value.
    pub value: f64,
    /// Value consistent with the frame grid.
    pub expected: f64,
    /// Human-readable description.
    pub message: String,
}

/// Grid snapping and precision correction for whole timelines.
#[derive(Clone, Copy, Debug)]
pub struct PrecisionCompensator {
    drift_threshold_frames: f64,
    lenient_snap_fraction: f64,
}

impl Default for PrecisionCompensator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl PrecisionCompensator {
    /// Take thresholds from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            drift_threshold_frames: config.drift_threshold_frames,
            lenient_snap_fraction: config.lenient_snap_fraction,
        }
    }

    /// Snap times to the frame grid.
    ///
    /// `strict` rounds every value to the nearest frame boundary. Otherwise only
    /// values within the lenient fraction (2% by default) of a boundary are moved,
    /// so intentionally sub-frame positions survive.
    pub fn align_keyframes_to_grid(
        &self,
        times: &[f64],
        fps: f64,
        strict: bool,
    ) -> TimegridResult<Vec<f64>> {
        let fps = ensure_fps(fps)?;
        times
            .iter()
            .map(|&t| {
                let t = ensure_non_negative("time", t)?;
                let frames = t * fps;
                let nearest = frames.round();
                if strict || (frames - nearest).abs() <= self.lenient_snap_fraction {
                    Ok(nearest / fps)
                } else {
                    Ok(t)
                }
            })
            .collect()
    }

    /// Force every frame field to an integer, every span to at least one frame and
    /// every time field to `frame / fps`; keypoints go through
    /// [`compensate_accumulated_error`].
    #[tracing::instrument(skip(self, timeline), fields(clips = timeline.clips.len(), tracks = timeline.tracks.len()))]
    pub fn correct_timeline_precision(&self, timeline: &Timeline, fps: f64) -> TimegridResult<Timeline> {
        let fps = ensure_fps(fps)?;
        let mut out = timeline.clone();
        for span in out.spans_mut() {
            span.start_frame = span.start_frame.round();
            span.end_frame = span.end_frame.round();
            span.enforce_min_length();
            span.set_times(fps);
        }
        if let Some(points) = &timeline.keypoints {
            out.keypoints = Some(compensate_accumulated_error(
                points,
                fps,
                self.drift_threshold_frames,
            )?);
        }
        Ok(out)
    }

    /// Read-only scan for fractional frame fields and frame/time mismatches above
    /// a tenth of a frame.
    pub fn analyze_precision_issues(&self, timeline: &Timeline, fps: f64) -> TimegridResult<Vec<PrecisionIssue>> {
        let fps = ensure_fps(fps)?;
        let mut issues = Vec::new();
        for (index, clip) in timeline.clips.iter().enumerate() {
            check_span(&clip.span, IssueLocation::Clip { index }, fps, &mut issues);
        }
        for (track, t) in timeline.tracks.iter().enumerate() {
            for (item, it) in t.items.iter().enumerate() {
                check_span(&it.span, IssueLocation::TrackItem { track, item }, fps, &mut issues);
            }
        }
        Ok(issues)
    }
}

fn check_span(span: &Span, location: IssueLocation, fps: f64, out: &mut Vec<PrecisionIssue>) {
    for (field, value) in [("start_frame", span.start_frame), ("end_frame", span.end_frame)] {
        let rounded = value.round();
        if (value - rounded).abs() > FRAME_EPSILON {
            out.push(PrecisionIssue {
                location,
                field: field.to_owned(),
                severity: Severity::Warning,
                value,
                expected: rounded,
                message: format!("{field} {value} is not a whole frame"),
            });
        }
    }

    let frame = frame_duration(fps);
    let start = span.start_frame.round() / fps;
    let end = span.end_frame.round() / fps;
    let times = [
        ("start_time", span.start_time, start),
        ("end_time", span.end_time, end),
        ("duration", span.duration, end - start),
    ];
    for (field, value, expected) in times {
        let Some(value) = value else {
            continue;
        };
        let diff = (value - expected).abs();
        if diff <= MISMATCH_REPORT_FRACTION * frame {
            continue;
        }
        let severity = if diff >= frame - FRAME_EPSILON {
            Severity::Error
        } else {
            Severity::Warning
        };
        out.push(PrecisionIssue {
            location,
            field: field.to_owned(),
            severity,
            value,
            expected,
            message: format!(
                "{field} {value:.6} s is {:.2} frames from the frame grid",
                diff / frame
            ),
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/precision.rs"]
mod tests;
