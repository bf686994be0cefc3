use std::collections::BTreeMap;

use crate::foundation::core::{FRAME_EPSILON, ensure_fps};
use crate::foundation::error::{TimegridError, TimegridResult};
use crate::time::timebase::{PlatformType, TimebaseStandard};

/// Free-form fields carried through the engine untouched.
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// A timeline as exchanged with upstream producers and downstream exporters.
///
/// Engine operations take a timeline by reference and return a new one; nothing is
/// mutated in place.
pub struct Timeline {
    /// Timeline frame rate.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Total duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Top-level clip list.
    #[serde(default)]
    pub clips: Vec<Clip>,
    /// Tracks, each with its own item list.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Optional marker timestamps in seconds (beats, chapter points).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<f64>>,
    /// Frame rate before the last timebase unification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_fps: Option<f64>,
    /// Timebase standard applied by the last unification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timebase: Option<TimebaseStandard>,
    /// Platform whose clock produced the time fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<PlatformType>,
    /// Platform the time fields were last quantized for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_platform: Option<PlatformType>,
    /// Everything else the producer sent.
    #[serde(flatten)]
    pub metadata: Metadata,
}

fn default_fps() -> f64 {
    30.0
}

/// Frame and time extent shared by clips and track items.
///
/// Frame positions are stored as `f64` because producers occasionally send
/// fractional frames; every engine pass writes integral values back.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    /// First frame.
    pub start_frame: f64,
    /// Frame after the last one.
    pub end_frame: f64,
    /// Start in seconds, if the producer tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// End in seconds, if the producer tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Duration in seconds, if the producer tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Span {
    /// Frame-only span.
    pub fn frames(start_frame: f64, end_frame: f64) -> Self {
        Self {
            start_frame,
            end_frame,
            ..Self::default()
        }
    }

    /// Span with every time field derived from the frames at `fps`.
    pub fn with_times(start_frame: f64, end_frame: f64, fps: f64) -> Self {
        let mut span = Self::frames(start_frame, end_frame);
        span.set_times(fps);
        span
    }

    /// Length in frames (negative for inverted spans).
    pub fn len_frames(&self) -> f64 {
        self.end_frame - self.start_frame
    }

    /// Overwrite all time fields from the frames.
    pub fn set_times(&mut self, fps: f64) {
        let start = self.start_frame / fps;
        let end = self.end_frame / fps;
        self.start_time = Some(start);
        self.end_time = Some(end);
        self.duration = Some(end - start);
    }

    /// Recompute the time fields that are present from the frames.
    pub fn refresh_times(&mut self, fps: f64) {
        let start = self.start_frame / fps;
        let end = self.end_frame / fps;
        if self.start_time.is_some() {
            self.start_time = Some(start);
        }
        if self.end_time.is_some() {
            self.end_time = Some(end);
        }
        if self.duration.is_some() {
            self.duration = Some(end - start);
        }
    }

    /// Extend `end_frame` so the span covers at least one frame.
    pub(crate) fn enforce_min_length(&mut self) -> bool {
        if self.end_frame < self.start_frame + 1.0 - FRAME_EPSILON {
            self.end_frame = self.start_frame + 1.0;
            return true;
        }
        false
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// A clip on the top-level clip list.
pub struct Clip {
    /// Frame/time extent.
    #[serde(flatten)]
    pub span: Span,
    /// Frame rate the clip's media declares, if different from the timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Everything else (ids, source paths, labels).
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Clip {
    /// Clip covering `[start_frame, end_frame)` with no time fields.
    pub fn new(start_frame: f64, end_frame: f64) -> Self {
        Self {
            span: Span::frames(start_frame, end_frame),
            ..Self::default()
        }
    }

    /// Clip covering `[start_frame, end_frame)` with time fields at `fps`.
    pub fn with_times(start_frame: f64, end_frame: f64, fps: f64) -> Self {
        Self {
            span: Span::with_times(start_frame, end_frame, fps),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// Media kind carried by a track.
pub enum TrackKind {
    /// Picture.
    Video,
    /// Sound.
    Audio,
    /// Subtitles and captions.
    Text,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// A track with its own ordered item list.
pub struct Track {
    /// Media kind.
    #[serde(default, alias = "type")]
    pub kind: TrackKind,
    /// Frame rate declared for the track, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Items placed on this track.
    #[serde(default)]
    pub items: Vec<TrackItem>,
    /// Everything else (ids, names).
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Track {
    /// Track of `kind` holding `items`.
    pub fn new(kind: TrackKind, items: Vec<TrackItem>) -> Self {
        Self {
            kind,
            items,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
/// A placement of a clip on a track.
pub struct TrackItem {
    /// Frame/time extent.
    #[serde(flatten)]
    pub span: Span,
    /// Clip this item references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_id: Option<String>,
    /// Everything else.
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl TrackItem {
    /// Item covering `[start_frame, end_frame)` with no time fields.
    pub fn new(start_frame: f64, end_frame: f64) -> Self {
        Self {
            span: Span::frames(start_frame, end_frame),
            ..Self::default()
        }
    }

    /// Item covering `[start_frame, end_frame)` with time fields at `fps`.
    pub fn with_times(start_frame: f64, end_frame: f64, fps: f64) -> Self {
        Self {
            span: Span::with_times(start_frame, end_frame, fps),
            ..Self::default()
        }
    }
}

impl Timeline {
    /// Empty timeline at `fps`.
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            duration: 0.0,
            clips: Vec::new(),
            tracks: Vec::new(),
            keypoints: None,
            original_fps: None,
            timebase: None,
            source_platform: None,
            target_platform: None,
            metadata: Metadata::new(),
        }
    }

    /// Validated timeline fps.
    pub fn checked_fps(&self) -> TimegridResult<f64> {
        ensure_fps(self.fps)
    }

    /// Every span: clips first, then track items in track order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.clips.iter().map(|c| &c.span).chain(
            self.tracks
                .iter()
                .flat_map(|t| t.items.iter().map(|i| &i.span)),
        )
    }

    /// Mutable view over every span, in the same order as [`Timeline::spans`].
    pub fn spans_mut(&mut self) -> impl Iterator<Item = &mut Span> {
        self.clips.iter_mut().map(|c| &mut c.span).chain(
            self.tracks
                .iter_mut()
                .flat_map(|t| t.items.iter_mut().map(|i| &mut i.span)),
        )
    }

    /// Recompute present time fields on every span from its frames.
    pub fn refresh_times(&mut self, fps: f64) {
        for span in self.spans_mut() {
            span.refresh_times(fps);
        }
    }

    /// Parse a timeline from JSON text.
    pub fn from_json_str(s: &str) -> TimegridResult<Self> {
        serde_json::from_str(s).map_err(|e| TimegridError::serde(e.to_string()))
    }

    /// Render as pretty JSON.
    pub fn to_json_string(&self) -> TimegridResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TimegridError::serde(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
