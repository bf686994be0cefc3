//! Read-only consistency checks: gaps, overlaps and frame-rate mismatches.

use crate::foundation::core::FRAME_EPSILON;
use crate::foundation::error::TimegridResult;
use crate::time::framerate::{FrameRateAdapter, Rational};
use crate::timeline::model::{Span, Timeline};

/// Empty stretch between two spans.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Gap {
    /// Input index of the span the gap follows.
    pub after: usize,
    /// Input index of the span the gap precedes.
    pub before: usize,
    /// First empty frame.
    pub start_frame: f64,
    /// First frame of the next span.
    pub end_frame: f64,
}

impl Gap {
    /// Gap length in frames.
    pub fn frames(&self) -> f64 {
        self.end_frame - self.start_frame
    }
}

/// Stretch covered by two spans at once.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Overlap {
    /// Input index of the earlier-starting span.
    pub first: usize,
    /// Input index of the later-starting span.
    pub second: usize,
    /// First shared frame.
    pub start_frame: f64,
    /// End of the shared stretch.
    pub end_frame: f64,
}

impl Overlap {
    /// Overlap length in frames.
    pub fn frames(&self) -> f64 {
        self.end_frame - self.start_frame
    }
}

fn sorted_by_start<'a>(spans: impl IntoIterator<Item = &'a Span>) -> Vec<(usize, &'a Span)> {
    let mut v: Vec<(usize, &Span)> = spans.into_iter().enumerate().collect();
    v.sort_by(|a, b| a.1.start_frame.total_cmp(&b.1.start_frame));
    v
}

/// Gaps of at least `min_gap_frames` between spans, in start order.
///
/// A span that is fully covered by an earlier, longer one does not open a gap.
pub fn detect_gaps<'a>(spans: impl IntoIterator<Item = &'a Span>, min_gap_frames: f64) -> Vec<Gap> {
    let sorted = sorted_by_start(spans);
    let mut gaps = Vec::new();
    let Some(&(first, first_span)) = sorted.first() else {
        return gaps;
    };
    let (mut reach_idx, mut reach) = (first, first_span.end_frame);
    for &(idx, span) in &sorted[1..] {
        let len = span.start_frame - reach;
        if len > FRAME_EPSILON && len >= min_gap_frames - FRAME_EPSILON {
            gaps.push(Gap {
                after: reach_idx,
                before: idx,
                start_frame: reach,
                end_frame: span.start_frame,
            });
        }
        if span.end_frame > reach {
            (reach_idx, reach) = (idx, span.end_frame);
        }
    }
    gaps
}

/// Overlaps between each span and its predecessor in start order.
pub fn detect_overlaps<'a>(spans: impl IntoIterator<Item = &'a Span>) -> Vec<Overlap> {
    let sorted = sorted_by_start(spans);
    sorted
        .windows(2)
        .filter_map(|w| {
            let ((a, prev), (b, curr)) = (w[0], w[1]);
            let end = prev.end_frame.min(curr.end_frame);
            (end - curr.start_frame > FRAME_EPSILON).then_some(Overlap {
                first: a,
                second: b,
                start_frame: curr.start_frame,
                end_frame: end,
            })
        })
        .collect()
}

/// What declared a frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSource {
    /// `timeline.clips[index].frame_rate`.
    Clip {
        /// Clip index.
        index: usize,
    },
    /// `timeline.tracks[index].frame_rate`.
    Track {
        /// Track index.
        index: usize,
    },
}

/// A declared frame rate that differs from the timeline's.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateMismatch {
    /// Where the rate was declared.
    pub source: RateSource,
    /// Declared rate.
    pub frame_rate: f64,
    /// Timeline rate.
    pub timeline_fps: f64,
    /// Every declared-rate frame lands on a timeline frame.
    pub lossless: bool,
    /// Advisory loss estimate for conforming to the timeline rate.
    pub quality_loss: f64,
}

/// Clips and tracks whose declared `frame_rate` is not the timeline fps.
///
/// Rates are compared as exact rationals, so `29.97` and `30000/1001` agree.
pub fn check_frame_rate_compatibility(timeline: &Timeline) -> TimegridResult<Vec<RateMismatch>> {
    let fps = timeline.checked_fps()?;
    let target = Rational::from_fps(fps)?;

    let declared = timeline
        .clips
        .iter()
        .enumerate()
        .filter_map(|(index, c)| c.frame_rate.map(|r| (RateSource::Clip { index }, r)))
        .chain(
            timeline
                .tracks
                .iter()
                .enumerate()
                .filter_map(|(index, t)| t.frame_rate.map(|r| (RateSource::Track { index }, r))),
        );

    let mut out = Vec::new();
    for (source, rate) in declared {
        if Rational::from_fps(rate)? == target {
            continue;
        }
        out.push(RateMismatch {
            source,
            frame_rate: rate,
            timeline_fps: fps,
            lossless: FrameRateAdapter::is_lossless(rate, fps)?,
            quality_loss: FrameRateAdapter::estimate_quality_loss(rate, fps)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/check.rs"]
mod tests;
