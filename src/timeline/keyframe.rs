//! Snapping cuts to keyframes, cut-point spacing and cross-track synchronization.

use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::foundation::core::{FRAME_EPSILON, RoundingMethod, ensure_non_negative};
use crate::foundation::error::{TimegridError, TimegridResult};
use crate::time::convert::{frames_to_seconds, seconds_to_frames};
use crate::timeline::model::Timeline;

/// Sorted, deduplicated keyframe positions with binary-search lookups.
///
/// Positions are in whatever unit the caller works in (frames or seconds).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyframeSet {
    positions: Vec<f64>,
}

impl KeyframeSet {
    /// Build from positions in any order. Fails on negative or non-finite values.
    pub fn new(positions: impl IntoIterator<Item = f64>) -> TimegridResult<Self> {
        let mut positions = positions
            .into_iter()
            .map(|p| ensure_non_negative("keyframe", p))
            .collect::<TimegridResult<Vec<_>>>()?;
        positions.sort_by(f64::total_cmp);
        positions.dedup();
        Ok(Self { positions })
    }

    /// Sorted positions.
    pub fn as_slice(&self) -> &[f64] {
        &self.positions
    }

    /// Number of distinct keyframes.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` when there are no keyframes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Closest keyframe; an exact tie goes to the later one.
    pub fn nearest(&self, value: f64) -> Option<f64> {
        let idx = self.positions.partition_point(|&k| k < value);
        let before = idx.checked_sub(1).map(|i| self.positions[i]);
        let after = self.positions.get(idx).copied();
        match (before, after) {
            (Some(b), Some(a)) => Some(if value - b < a - value { b } else { a }),
            (b, a) => a.or(b),
        }
    }

    /// Last keyframe `<= value`, or the first keyframe when all are later.
    pub fn previous(&self, value: f64) -> Option<f64> {
        let idx = self.positions.partition_point(|&k| k <= value);
        match idx {
            0 => self.positions.first().copied(),
            i => Some(self.positions[i - 1]),
        }
    }

    /// First keyframe `> value`, or the last keyframe when none is later.
    pub fn next(&self, value: f64) -> Option<f64> {
        let idx = self.positions.partition_point(|&k| k <= value);
        self.positions
            .get(idx)
            .or_else(|| self.positions.last())
            .copied()
    }

    /// Nearest keyframe if it is within `threshold` of `value`, else `value`.
    pub fn align(&self, value: f64, threshold: f64) -> f64 {
        match self.nearest(value) {
            Some(k) if (k - value).abs() <= threshold => k,
            _ => value,
        }
    }
}

/// Snap `value` to the nearest of `keyframes` when it is within `threshold`.
///
/// Equidistant candidates resolve to the later keyframe. An empty keyframe list
/// leaves `value` unchanged.
pub fn align_to_keyframes(value: f64, keyframes: &[f64], threshold: f64) -> TimegridResult<f64> {
    let set = KeyframeSet::new(keyframes.iter().copied())?;
    let aligned = set.align(value, threshold);
    if aligned != value {
        tracing::debug!(value, aligned, "snapped to keyframe");
    }
    Ok(aligned)
}

/// Strategy for [`find_optimal_keyframe`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyframePreference {
    /// Closest keyframe.
    #[default]
    Nearest,
    /// Last keyframe at or before the target (cut points).
    Previous,
    /// First keyframe after the target (transition starts).
    Next,
    /// Blend of proximity and keyframe weight.
    ContentWeighted,
}

/// A keyframe position with an optional importance weight in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeightedKeyframe {
    /// Position, in the same unit as the target.
    pub position: f64,
    /// Content importance; `None` for plain keyframes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

const PROXIMITY_WEIGHT: f64 = 0.7;
const CONTENT_WEIGHT: f64 = 0.3;

/// Pick a keyframe for `target` according to `preference`.
///
/// Returns `target` when `keyframes` is empty. `ContentWeighted` has no weights
/// to work with here and behaves like `Nearest`.
pub fn find_optimal_keyframe(
    target: f64,
    keyframes: &[f64],
    preference: KeyframePreference,
) -> TimegridResult<f64> {
    let set = KeyframeSet::new(keyframes.iter().copied())?;
    let found = match preference {
        KeyframePreference::Nearest | KeyframePreference::ContentWeighted => set.nearest(target),
        KeyframePreference::Previous => set.previous(target),
        KeyframePreference::Next => set.next(target),
    };
    Ok(found.unwrap_or(target))
}

/// [`find_optimal_keyframe`] over weighted keyframes.
///
/// With `ContentWeighted`, each candidate scores `0.7 / (1 + |delta|) + 0.3 * weight`
/// (a missing weight counts as 0) and the best score wins. Candidates are scored
/// in position order, not input order, and ties go to the later position. When
/// no keyframe carries a weight it falls back to `Nearest`.
pub fn find_optimal_weighted_keyframe(
    target: f64,
    keyframes: &[WeightedKeyframe],
    preference: KeyframePreference,
) -> TimegridResult<f64> {
    let weighted = keyframes.iter().any(|k| k.weight.is_some());
    if preference != KeyframePreference::ContentWeighted || !weighted {
        let positions: Vec<f64> = keyframes.iter().map(|k| k.position).collect();
        return find_optimal_keyframe(target, &positions, preference);
    }

    let mut sorted = keyframes.to_vec();
    for k in &sorted {
        ensure_non_negative("keyframe", k.position)?;
        if let Some(w) = k.weight
            && !w.is_finite()
        {
            return Err(TimegridError::invalid_argument(format!(
                "keyframe weight must be finite, got {w}"
            )));
        }
    }
    sorted.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut best = target;
    let mut best_score = f64::NEG_INFINITY;
    for k in sorted {
        let proximity = 1.0 / (1.0 + (k.position - target).abs());
        let score = PROXIMITY_WEIGHT * proximity + CONTENT_WEIGHT * k.weight.unwrap_or(0.0);
        if score >= best_score {
            best_score = score;
            best = k.position;
        }
    }
    Ok(best)
}

/// Place cuts on keyframes while keeping every segment at least `min_segment` long.
///
/// Cuts are processed in ascending order. Each goes to the previous keyframe; if
/// that lands closer than `min_segment` to the cut placed before it, the next
/// keyframe is tried, and failing that the cut is forced to
/// `previous_cut + min_segment`. The timeline origin counts as the cut before the
/// first one, so the first cut also lands at least `min_segment` after zero
/// unless it sits on the origin itself. Without keyframes the cuts stay where
/// they are apart from the spacing rule.
pub fn optimize_cut_points(
    cuts: &[f64],
    keyframes: &[f64],
    min_segment: f64,
) -> TimegridResult<Vec<f64>> {
    let min_segment = ensure_non_negative("min_segment", min_segment)?;
    let set = KeyframeSet::new(keyframes.iter().copied())?;
    let mut sorted = cuts
        .iter()
        .map(|&c| ensure_non_negative("cut point", c))
        .collect::<TimegridResult<Vec<_>>>()?;
    sorted.sort_by(f64::total_cmp);

    let mut out: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut prev = 0.0;
    for cut in sorted {
        let candidate = set.previous(cut).unwrap_or(cut);
        let placed = if out.is_empty() && cut <= FRAME_EPSILON {
            0.0
        } else if candidate - prev >= min_segment {
            candidate
        } else {
            match set.next(cut) {
                Some(next) if next - prev >= min_segment => next,
                _ => prev + min_segment,
            }
        };
        out.push(placed);
        prev = placed;
    }
    Ok(out)
}

/// Every clip and track-item boundary, in seconds, thinned so that kept values
/// are at least `min_distance` apart.
pub fn extract_keyframes_from_timeline(
    timeline: &Timeline,
    min_distance: f64,
) -> TimegridResult<Vec<f64>> {
    let fps = timeline.checked_fps()?;
    let min_distance = ensure_non_negative("min_distance", min_distance)?;

    let mut times = Vec::new();
    for span in timeline.spans() {
        times.push(frames_to_seconds(span.start_frame, fps)?);
        times.push(frames_to_seconds(span.end_frame, fps)?);
    }
    times.sort_by(f64::total_cmp);
    times.dedup();

    let mut kept: Vec<f64> = Vec::with_capacity(times.len());
    for t in times {
        if kept.last().is_none_or(|&last| t - last >= min_distance) {
            kept.push(t);
        }
    }
    Ok(kept)
}

#[derive(Clone, Copy)]
struct Boundary {
    time: f64,
    track: usize,
    item: usize,
    is_end: bool,
}

/// Snap near-coincident track-item boundaries across all tracks to a shared frame.
///
/// Boundaries are swept in time order; a new cluster starts whenever the gap to
/// the previous boundary exceeds `max_offset` seconds. Every member of a cluster
/// with more than one boundary moves to the frame nearest the cluster mean.
/// Present time fields are refreshed and every item keeps at least one frame.
#[tracing::instrument(skip(timeline), fields(tracks = timeline.tracks.len()))]
pub fn synchronize_keyframes_across_tracks(
    timeline: &Timeline,
    max_offset: f64,
) -> TimegridResult<Timeline> {
    let fps = timeline.checked_fps()?;
    let max_offset = ensure_non_negative("max_offset", max_offset)?;

    let mut bounds = Vec::new();
    for (track, t) in timeline.tracks.iter().enumerate() {
        for (item, it) in t.items.iter().enumerate() {
            bounds.push(Boundary {
                time: frames_to_seconds(it.span.start_frame, fps)?,
                track,
                item,
                is_end: false,
            });
            bounds.push(Boundary {
                time: frames_to_seconds(it.span.end_frame, fps)?,
                track,
                item,
                is_end: true,
            });
        }
    }
    bounds.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut out = timeline.clone();
    let mut start = 0;
    while start < bounds.len() {
        let mut end = start + 1;
        while end < bounds.len() && bounds[end].time - bounds[end - 1].time <= max_offset {
            end += 1;
        }
        let cluster = &bounds[start..end];
        if cluster.len() > 1 {
            let mean = cluster.iter().map(|b| b.time).sum::<f64>() / cluster.len() as f64;
            let frame = seconds_to_frames(mean, fps, RoundingMethod::Round)? as f64;
            tracing::debug!(members = cluster.len(), mean, frame, "synchronized boundary cluster");
            for b in cluster {
                let span = &mut out.tracks[b.track].items[b.item].span;
                if b.is_end {
                    span.end_frame = frame;
                } else {
                    span.start_frame = frame;
                }
            }
        }
        start = end;
    }

    for track in &mut out.tracks {
        for item in &mut track.items {
            item.span.enforce_min_length();
            item.span.refresh_times(fps);
        }
    }
    Ok(out)
}

/// How aggressively [`KeyframeAligner::optimize_timeline_keyframes`] moves cuts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Snap within 5 frames, segments of at least 0.5 s.
    Low,
    /// Snap within 3 frames, segments of at least 1 s.
    #[default]
    Medium,
    /// Snap within 1 frame, segments of at least 2 s.
    High,
}

impl Strictness {
    /// `(threshold_frames, min_segment_secs)`.
    pub fn params(self) -> (f64, f64) {
        match self {
            Self::Low => (5.0, 0.5),
            Self::Medium => (3.0, 1.0),
            Self::High => (1.0, 2.0),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strictness {
    type Err = TimegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(TimegridError::invalid_argument(format!(
                "unknown strictness '{s}'"
            ))),
        }
    }
}

/// What is known about the source media.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoInfo {
    /// Media duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Decoder-reported keyframe timestamps in seconds.
    #[serde(default)]
    pub keyframes: Vec<f64>,
    /// Timeline cut against this media, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
}

/// Where [`KeyframeAligner::extract_keyframes`] takes keyframes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeSource {
    /// First available of metadata, timeline, uniform grid.
    #[default]
    Auto,
    /// Clip and track-item boundaries of the attached timeline.
    Timeline,
    /// Decoder-reported keyframes.
    Metadata,
    /// Fixed-interval grid over the media duration.
    Uniform,
}

impl KeyframeSource {
    /// Resolve `Auto` against what `info` actually carries.
    pub fn resolve(self, info: &VideoInfo) -> Self {
        match self {
            Self::Auto if !info.keyframes.is_empty() => Self::Metadata,
            Self::Auto if info.timeline.is_some() => Self::Timeline,
            Self::Auto => Self::Uniform,
            other => other,
        }
    }
}

/// One cut that is further than the tolerance from every reference keyframe.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Misalignment {
    /// Cut time in seconds.
    pub cut_point: f64,
    /// Closest reference keyframe in seconds.
    pub nearest_keyframe: f64,
    /// `|cut_point - nearest_keyframe|`.
    pub distance: f64,
}

/// Result of [`KeyframeAligner::analyze_keyframe_alignment`].
///
/// Cuts are only classified when there are reference keyframes, so with none
/// `aligned_cuts + non_aligned_cuts` is zero while `total_cut_points` is not.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlignmentReport {
    /// Distinct cut times found in the timeline.
    pub total_cut_points: usize,
    /// Cuts within tolerance of a keyframe.
    pub aligned_cuts: usize,
    /// Cuts outside tolerance.
    pub non_aligned_cuts: usize,
    /// `aligned_cuts / total_cut_points`, 0 for an empty timeline.
    pub alignment_rate: f64,
    /// Mean distance of the non-aligned cuts, seconds.
    pub avg_misalignment: f64,
    /// Up to ten worst cuts, largest distance first.
    pub misaligned_cuts: Vec<Misalignment>,
}

const WORST_CUTS_REPORTED: usize = 10;

/// Absorbs float error when boundaries one frame apart are compared in seconds.
const SYNC_SLACK_SECS: f64 = 1e-9;

/// Keyframe extraction, timeline optimization and alignment diagnostics.
#[derive(Clone, Debug, Default)]
pub struct KeyframeAligner {
    config: EngineConfig,
}

impl KeyframeAligner {
    /// Aligner using the tolerances of `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Keyframe timestamps (seconds, ascending) from `source`.
    pub fn extract_keyframes(
        &self,
        info: &VideoInfo,
        source: KeyframeSource,
    ) -> TimegridResult<Vec<f64>> {
        let resolved = source.resolve(info);
        let keyframes = match resolved {
            KeyframeSource::Metadata => {
                KeyframeSet::new(info.keyframes.iter().copied())?.positions
            }
            KeyframeSource::Timeline => match &info.timeline {
                Some(tl) => extract_keyframes_from_timeline(tl, self.config.keyframe_min_distance_secs)?,
                None => Vec::new(),
            },
            KeyframeSource::Uniform => {
                let duration = ensure_non_negative("duration", info.duration)?;
                let step = self.config.uniform_keyframe_interval_secs;
                let count = (duration / step).floor() as usize;
                if duration > 0.0 {
                    (0..=count).map(|i| i as f64 * step).collect()
                } else {
                    Vec::new()
                }
            }
            KeyframeSource::Auto => Vec::new(),
        };
        tracing::debug!(source = ?resolved, count = keyframes.len(), "extracted keyframes");
        Ok(keyframes)
    }

    /// Align a whole timeline to keyframes.
    ///
    /// Reference keyframes come from `video` when it reports any, otherwise from
    /// the timeline's own boundaries. Clip boundaries snap within the strictness
    /// threshold; each track's cut points go through [`optimize_cut_points`] with
    /// the strictness minimum segment; tracks are then synchronized to within one
    /// frame. Every span keeps at least one frame and present time fields are
    /// recomputed.
    #[tracing::instrument(skip(self, timeline, video), fields(clips = timeline.clips.len(), tracks = timeline.tracks.len()))]
    pub fn optimize_timeline_keyframes(
        &self,
        timeline: &Timeline,
        video: Option<&VideoInfo>,
        strictness: Strictness,
    ) -> TimegridResult<Timeline> {
        let fps = timeline.checked_fps()?;
        let (threshold, min_segment_secs) = strictness.params();

        let reference = match video {
            Some(info) if !info.keyframes.is_empty() => info.keyframes.clone(),
            _ => extract_keyframes_from_timeline(timeline, self.config.keyframe_min_distance_secs)?,
        };
        if reference.is_empty() {
            tracing::warn!("no keyframes available, timeline left unchanged");
            return Ok(timeline.clone());
        }

        let frames = reference
            .iter()
            .map(|&t| seconds_to_frames(t, fps, RoundingMethod::Round).map(|f| f as f64))
            .collect::<TimegridResult<Vec<_>>>()?;
        let set = KeyframeSet::new(frames)?;

        let mut out = timeline.clone();
        for clip in &mut out.clips {
            clip.span.start_frame = set.align(clip.span.start_frame, threshold);
            clip.span.end_frame = set.align(clip.span.end_frame, threshold);
        }

        for track in &mut out.tracks {
            let mut cuts: Vec<f64> = track
                .items
                .iter()
                .flat_map(|i| [i.span.start_frame, i.span.end_frame])
                .collect();
            cuts.sort_by(f64::total_cmp);
            cuts.dedup();
            let placed = optimize_cut_points(&cuts, set.as_slice(), min_segment_secs * fps)?;
            let moved = |v: f64| {
                cuts.binary_search_by(|c| c.total_cmp(&v))
                    .map_or(v, |i| placed[i])
            };
            for item in &mut track.items {
                item.span.start_frame = moved(item.span.start_frame);
                item.span.end_frame = moved(item.span.end_frame);
            }
        }

        let mut out = synchronize_keyframes_across_tracks(&out, 1.0 / fps + SYNC_SLACK_SECS)?;
        for span in out.spans_mut() {
            if span.enforce_min_length() {
                tracing::debug!(start = span.start_frame, "extended collapsed span to one frame");
            }
            span.refresh_times(fps);
        }
        Ok(out)
    }

    /// Compare every cut of `timeline` with `reference` keyframes (seconds).
    ///
    /// `None` uses the timeline's own boundaries as reference.
    pub fn analyze_keyframe_alignment(
        &self,
        timeline: &Timeline,
        reference: Option<&[f64]>,
    ) -> TimegridResult<AlignmentReport> {
        let fps = timeline.checked_fps()?;
        let reference = match reference {
            Some(r) => KeyframeSet::new(r.iter().copied())?,
            None => KeyframeSet::new(extract_keyframes_from_timeline(
                timeline,
                self.config.keyframe_min_distance_secs,
            )?)?,
        };

        let mut cuts = Vec::new();
        for span in timeline.spans() {
            cuts.push(frames_to_seconds(span.start_frame, fps)?);
            cuts.push(frames_to_seconds(span.end_frame, fps)?);
        }
        cuts.sort_by(f64::total_cmp);
        cuts.dedup();

        let tolerance = self.config.alignment_tolerance_secs;
        let mut report = AlignmentReport {
            total_cut_points: cuts.len(),
            ..AlignmentReport::default()
        };
        let mut misaligned = Vec::new();
        for &cut in &cuts {
            let Some(nearest) = reference.nearest(cut) else {
                continue;
            };
            let distance = (nearest - cut).abs();
            if distance <= tolerance {
                report.aligned_cuts += 1;
            } else {
                report.non_aligned_cuts += 1;
                misaligned.push(Misalignment {
                    cut_point: cut,
                    nearest_keyframe: nearest,
                    distance,
                });
            }
        }

        if !cuts.is_empty() {
            report.alignment_rate = report.aligned_cuts as f64 / cuts.len() as f64;
        }
        if !misaligned.is_empty() {
            report.avg_misalignment =
                misaligned.iter().map(|m| m.distance).sum::<f64>() / misaligned.len() as f64;
        }
        misaligned.sort_by(|a, b| b.distance.total_cmp(&a.distance));
        misaligned.truncate(WORST_CUTS_REPORTED);
        report.misaligned_cuts = misaligned;
        Ok(report)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/keyframe.rs"]
mod tests;
