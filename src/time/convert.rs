//! Pure conversions between seconds, frame indices and timecode text.

use crate::foundation::core::{RoundingMethod, ensure_fps, ensure_non_negative};
use crate::foundation::error::TimegridResult;
use crate::time::timecode::{TimeCode, TimecodeText, render_frame_suffix};

/// Convert seconds to a frame index: `rounding(seconds * fps)`.
pub fn seconds_to_frames(seconds: f64, fps: f64, rounding: RoundingMethod) -> TimegridResult<i64> {
    let seconds = ensure_non_negative("seconds", seconds)?;
    let fps = ensure_fps(fps)?;
    Ok(rounding.apply(seconds * fps))
}

/// Convert a (possibly fractional) frame position to seconds: `frames / fps`.
pub fn frames_to_seconds(frames: f64, fps: f64) -> TimegridResult<f64> {
    let frames = ensure_non_negative("frames", frames)?;
    let fps = ensure_fps(fps)?;
    Ok(frames / fps)
}

/// Retime a frame index from `src_fps` to `dst_fps` through seconds.
///
/// Lossy when `dst_fps < src_fps`: several source frames map onto one destination frame.
pub fn convert_frame_between_fps(
    frame: i64,
    src_fps: f64,
    dst_fps: f64,
    rounding: RoundingMethod,
) -> TimegridResult<i64> {
    let seconds = frames_to_seconds(frame as f64, src_fps)?;
    seconds_to_frames(seconds, dst_fps, rounding)
}

/// Parse `HH:MM:SS:FF`, `HH:MM:SS.mmm` or `HH:MM:SS,mmm` into a frame index at `fps`.
pub fn timecode_to_frames(text: &str, fps: f64, rounding: RoundingMethod) -> TimegridResult<i64> {
    let fps = ensure_fps(fps)?;
    let seconds = TimecodeText::parse(text)?.to_seconds(fps)?;
    seconds_to_frames(seconds, fps, rounding)
}

/// Render a frame index as `HH:MM:SS:FF` (`use_frame_suffix`) or `HH:MM:SS.mmm`.
///
/// Sub-second parts that round up to a whole second carry into the seconds field.
pub fn frames_to_timecode(frames: i64, fps: f64, use_frame_suffix: bool) -> TimegridResult<String> {
    let seconds = frames_to_seconds(frames as f64, fps)?;
    if use_frame_suffix {
        render_frame_suffix(seconds, fps)
    } else {
        Ok(TimeCode::from_seconds(seconds)?.to_standard_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/time/convert.rs"]
mod tests;
