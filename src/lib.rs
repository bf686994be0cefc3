//! timegrid converts, aligns and repairs time representations of editing timelines.
//!
//! The engine works on plain [`Timeline`] values and never mutates its inputs:
//!
//! - Convert between seconds, frame indices and textual timecodes ([`seconds_to_frames`],
//!   [`timecode_to_frames`], [`TimeCode`])
//! - Retime between frame rates and judge the loss ([`FrameRateAdapter`])
//! - Keep rounding and accumulated drift on the frame grid ([`PrecisionCompensator`])
//! - Snap cuts to keyframes and synchronize tracks ([`KeyframeAligner`])
//! - Unify a whole timeline to a timebase and platform clock, and repair structural
//!   defects ([`TimebaseUnifier`])
//! - Run all of the above over one or many timelines ([`process_timeline`], [`process_batch`])
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod foundation;
mod pipeline;
mod time;
mod timeline;

pub use crate::config::EngineConfig;
pub use crate::foundation::core::{FRAME_EPSILON, RoundingMethod};
pub use crate::foundation::error::{TimegridError, TimegridResult};
pub use crate::pipeline::{
    BatchThreading, PipelineOptions, ProcessedTimeline, process_batch, process_timeline,
};
pub use crate::time::convert::{
    convert_frame_between_fps, frames_to_seconds, frames_to_timecode, seconds_to_frames,
    timecode_to_frames,
};
pub use crate::time::framerate::{FrameRateAdapter, Rational};
pub use crate::time::timebase::{
    PlatformSetting, PlatformType, TimebaseStandard, detect_platform, get_platform_timebase,
    get_timebase_fps,
};
pub use crate::time::timecode::TimeCode;
pub use crate::timeline::check::{
    Gap, Overlap, RateMismatch, RateSource, check_frame_rate_compatibility, detect_gaps,
    detect_overlaps,
};
pub use crate::timeline::keyframe::{
    AlignmentReport, KeyframeAligner, KeyframePreference, KeyframeSet, KeyframeSource,
    Misalignment, Strictness, VideoInfo, WeightedKeyframe, align_to_keyframes,
    extract_keyframes_from_timeline, find_optimal_keyframe, find_optimal_weighted_keyframe,
    optimize_cut_points, synchronize_keyframes_across_tracks,
};
pub use crate::timeline::model::{Clip, Metadata, Span, Timeline, Track, TrackItem, TrackKind};
pub use crate::timeline::precision::{
    IssueLocation, PrecisionCompensator, PrecisionIssue, Severity, compensate_accumulated_error,
    compensate_rounding_error,
};
pub use crate::timeline::unify::{
    TimeRange, TimebaseUnifier, adjust_for_platform_precision, convert_timebase,
    normalize_timecode,
};
