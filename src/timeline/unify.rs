//! Whole-timeline timebase unification, boundary healing and structural repair.

use crate::config::EngineConfig;
use crate::foundation::core::{FRAME_EPSILON, RoundingMethod, ensure_fps, ensure_non_negative};
use crate::foundation::error::TimegridResult;
use crate::time::convert::{
    convert_frame_between_fps, frames_to_seconds, frames_to_timecode, seconds_to_frames,
    timecode_to_frames,
};
use crate::time::timebase::{PlatformType, TimebaseStandard, get_timebase_fps};
use crate::timeline::model::{Clip, Span, Timeline, TrackItem};

/// A `[start, end]` pair in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Start, seconds.
    pub start: f64,
    /// End, seconds.
    pub end: f64,
}

/// Scale a range by `dst_fps / src_fps`, rounded to the millisecond.
pub fn convert_timebase(start: f64, end: f64, src_fps: f64, dst_fps: f64) -> TimegridResult<TimeRange> {
    let start = ensure_non_negative("start", start)?;
    let end = ensure_non_negative("end", end)?;
    let scale = ensure_fps(dst_fps)? / ensure_fps(src_fps)?;
    Ok(TimeRange {
        start: round_millis(start * scale),
        end: round_millis(end * scale),
    })
}

fn round_millis(v: f64) -> f64 {
    (v * 1_000.0).round() / 1_000.0
}

/// Re-express a timecode written under `src` in the `dst` timebase.
///
/// The text is parsed at the source rate, its frame index retimed to the
/// destination rate and rendered as `HH:MM:SS:FF` when `dst` is frame oriented
/// (cinema and NTSC family), `HH:MM:SS.mmm` otherwise. The custom rates are only
/// consulted for [`TimebaseStandard::Custom`].
pub fn normalize_timecode(
    text: &str,
    src: TimebaseStandard,
    dst: TimebaseStandard,
    custom_src_fps: Option<f64>,
    custom_dst_fps: Option<f64>,
) -> TimegridResult<String> {
    let src_fps = get_timebase_fps(src, custom_src_fps)?;
    let dst_fps = get_timebase_fps(dst, custom_dst_fps)?;
    let frames = timecode_to_frames(text, src_fps, RoundingMethod::Round)?;
    let retimed = convert_frame_between_fps(frames, src_fps, dst_fps, RoundingMethod::Round)?;
    frames_to_timecode(retimed, dst_fps, dst.is_frame_oriented())
}

/// Requantize a time value from the clock of `src` to the clock of `dst`.
///
/// The value is first rounded to a whole number of `src` ticks; that tick count
/// is rescaled to `dst` resolution and rounded again. Going from a fine to a
/// coarse clock therefore drops sub-tick offsets.
pub fn adjust_for_platform_precision(
    value: f64,
    src: PlatformType,
    dst: PlatformType,
) -> TimegridResult<f64> {
    let value = ensure_non_negative("time value", value)?;
    let src_res = src.time_resolution() as f64;
    let dst_res = dst.time_resolution() as f64;
    if src_res == dst_res {
        return Ok(value);
    }
    let src_ticks = (value * src_res).round();
    let dst_ticks = (src_ticks * dst_res / src_res).round();
    Ok(dst_ticks / dst_res)
}

/// Items whose frame span takes part in boundary healing.
trait Placed {
    fn span(&self) -> &Span;
    fn span_mut(&mut self) -> &mut Span;
}

impl Placed for Clip {
    fn span(&self) -> &Span {
        &self.span
    }
    fn span_mut(&mut self) -> &mut Span {
        &mut self.span
    }
}

impl Placed for TrackItem {
    fn span(&self) -> &Span {
        &self.span
    }
    fn span_mut(&mut self) -> &mut Span {
        &mut self.span
    }
}

/// Sort by start frame and close small gaps/overlaps between neighbours.
fn heal_boundaries<T: Placed>(items: &mut [T], tolerance: f64, fps: f64, scope: &str) -> usize {
    items.sort_by(|a, b| a.span().start_frame.total_cmp(&b.span().start_frame));
    let mut healed = 0;
    for i in 1..items.len() {
        let (head, tail) = items.split_at_mut(i);
        let prev = head[i - 1].span_mut();
        let curr = tail[0].span_mut();
        let delta = curr.start_frame - prev.end_frame;

        if delta > FRAME_EPSILON && delta <= tolerance + FRAME_EPSILON {
            prev.end_frame = curr.start_frame;
            prev.refresh_times(fps);
            healed += 1;
            tracing::debug!(scope, index = i, gap = delta, "closed gap");
        } else if delta < -FRAME_EPSILON && -delta <= tolerance + FRAME_EPSILON {
            if curr.end_frame - prev.end_frame >= 1.0 - FRAME_EPSILON {
                curr.start_frame = prev.end_frame;
                curr.refresh_times(fps);
                healed += 1;
                tracing::debug!(scope, index = i, overlap = -delta, "closed overlap");
            } else {
                tracing::debug!(scope, index = i, overlap = -delta, "overlap left, item too short");
            }
        }
    }
    healed
}

/// Timeline-level timebase operations, parameterized by an [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct TimebaseUnifier {
    config: EngineConfig,
}

impl TimebaseUnifier {
    /// Unifier using the defaults and tolerances of `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Move a timeline onto `target` timebase and the clock of `target_platform`.
    ///
    /// Frame fields are retimed through seconds; present time fields keep their
    /// value in seconds but are requantized from the source platform's clock
    /// (`timeline.source_platform`, else the configured platform). A span that
    /// rounds to zero length at the target rate keeps one frame. Neighbouring
    /// boundaries are healed afterwards with
    /// [`TimebaseUnifier::compensate_timeline_boundaries`].
    #[tracing::instrument(skip(self, timeline), fields(clips = timeline.clips.len(), tracks = timeline.tracks.len()))]
    pub fn unify_timeline_timebase(
        &self,
        timeline: &Timeline,
        target: TimebaseStandard,
        target_platform: Option<PlatformType>,
        custom_fps: Option<f64>,
    ) -> TimegridResult<Timeline> {
        let src_fps = timeline.checked_fps()?;
        let dst_fps = get_timebase_fps(target, custom_fps)?;
        let dst_platform = target_platform.unwrap_or_else(|| self.config.platform());
        let src_platform = timeline
            .source_platform
            .unwrap_or_else(|| self.config.platform());

        let mut out = timeline.clone();
        for span in out.spans_mut() {
            for frame in [&mut span.start_frame, &mut span.end_frame] {
                let seconds = frames_to_seconds(*frame, src_fps)?;
                *frame = seconds_to_frames(seconds, dst_fps, RoundingMethod::Round)? as f64;
            }
            for time in [&mut span.start_time, &mut span.end_time, &mut span.duration]
                .into_iter()
                .flatten()
            {
                *time = adjust_for_platform_precision(*time, src_platform, dst_platform)?;
            }
            if span.enforce_min_length() {
                span.refresh_times(dst_fps);
                tracing::debug!(start = span.start_frame, "retimed span collapsed, kept one frame");
            }
        }

        out.original_fps = Some(src_fps);
        out.fps = dst_fps;
        out.timebase = Some(target);
        out.target_platform = Some(dst_platform);
        tracing::debug!(src_fps, dst_fps, %src_platform, %dst_platform, "retimed timeline");

        self.compensate_timeline_boundaries(&out)
    }

    /// Sort clips (and each track's items) by start frame and heal rounding seams.
    ///
    /// A gap of at most `boundary_tolerance_frames` is closed by extending the
    /// earlier item; an overlap of at most that size is closed by advancing the
    /// later item's start, as long as the later item keeps at least one frame.
    /// Larger discrepancies are left alone. Present time fields of moved
    /// boundaries are recomputed.
    #[tracing::instrument(skip(self, timeline))]
    pub fn compensate_timeline_boundaries(&self, timeline: &Timeline) -> TimegridResult<Timeline> {
        let fps = timeline.checked_fps()?;
        let tolerance = self.config.boundary_tolerance_frames;
        let mut out = timeline.clone();
        let mut healed = heal_boundaries(&mut out.clips, tolerance, fps, "clips");
        for track in &mut out.tracks {
            healed += heal_boundaries(&mut track.items, tolerance, fps, "track");
        }
        if healed > 0 {
            tracing::debug!(healed, "healed boundaries");
        }
        Ok(out)
    }

    /// Repair structural defects and describe each repair.
    ///
    /// Fixes an implausible fps (non-finite, `<= 0` or above `max_fps`) by
    /// replacing it with `default_fps`, a negative duration by clamping it to
    /// zero, inverted spans by swapping their ends and zero-length spans by
    /// extending them to one frame. When anything was repaired every span's time
    /// fields are rewritten from its frames. A duration above
    /// `max_duration_secs` is only logged through `tracing`, so a repaired
    /// timeline always yields an empty log on a second pass.
    #[tracing::instrument(skip(self, timeline))]
    pub fn detect_and_fix_timebase_issues(&self, timeline: &Timeline) -> (Timeline, Vec<String>) {
        let mut out = timeline.clone();
        let mut log = Vec::new();

        let fps = out.fps;
        if !fps.is_finite() || fps <= 0.0 || fps > self.config.max_fps {
            out.fps = self.config.default_fps;
            log.push(format!(
                "abnormal frame rate {fps}, replaced with {}",
                self.config.default_fps
            ));
        }

        let duration = out.duration;
        if duration.is_nan() || duration < 0.0 {
            out.duration = 0.0;
            log.push(format!("negative duration {duration}, clamped to 0"));
        } else if duration > self.config.max_duration_secs {
            tracing::warn!(duration, limit = self.config.max_duration_secs, "timeline longer than expected");
        }

        for (i, clip) in out.clips.iter_mut().enumerate() {
            repair_span(&mut clip.span, &format!("clip {i}"), &mut log);
        }
        for (t, track) in out.tracks.iter_mut().enumerate() {
            for (i, item) in track.items.iter_mut().enumerate() {
                repair_span(&mut item.span, &format!("track {t} item {i}"), &mut log);
            }
        }

        if !log.is_empty() {
            let fps = out.fps;
            for span in out.spans_mut() {
                span.set_times(fps);
            }
            for line in &log {
                tracing::debug!(repair = %line);
            }
        }
        (out, log)
    }
}

fn repair_span(span: &mut Span, what: &str, log: &mut Vec<String>) {
    if span.start_frame > span.end_frame {
        std::mem::swap(&mut span.start_frame, &mut span.end_frame);
        log.push(format!(
            "{what}: start and end were inverted, swapped to {}..{}",
            span.start_frame, span.end_frame
        ));
    }
    if span.start_frame == span.end_frame {
        span.end_frame = span.start_frame + 1.0;
        log.push(format!("{what}: zero length, extended to one frame"));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/unify.rs"]
mod tests;
