use std::fmt;
use std::str::FromStr;

use crate::foundation::core::ensure_fps;
use crate::foundation::error::{TimegridError, TimegridResult};

const MAX_HOURS: u8 = 99;
const MAX_TOTAL_MILLIS: u64 = 99 * 3_600_000 + 59 * 60_000 + 59 * 1_000 + 999;
const MAX_WHOLE_SECONDS: u64 = MAX_TOTAL_MILLIS / 1_000;

/// Canonical `hours:minutes:seconds.milliseconds` time value.
///
/// All fields are range-checked at construction (`hours <= 99`, `minutes <= 59`,
/// `seconds <= 59`, `milliseconds <= 999`), so every `TimeCode` in circulation is
/// valid. Ordering is chronological.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct TimeCode {
    hours: u8,
    minutes: u8,
    seconds: u8,
    milliseconds: u16,
}

impl TimeCode {
    /// `00:00:00.000`.
    pub const ZERO: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
        milliseconds: 0,
    };

    /// Create a validated timecode.
    pub fn new(hours: u8, minutes: u8, seconds: u8, milliseconds: u16) -> TimegridResult<Self> {
        if hours > MAX_HOURS {
            return Err(out_of_range("hours", u64::from(hours), u64::from(MAX_HOURS)));
        }
        if minutes > 59 {
            return Err(out_of_range("minutes", u64::from(minutes), 59));
        }
        if seconds > 59 {
            return Err(out_of_range("seconds", u64::from(seconds), 59));
        }
        if milliseconds > 999 {
            return Err(out_of_range("milliseconds", u64::from(milliseconds), 999));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            milliseconds,
        })
    }

    /// Build from a total millisecond count.
    pub fn from_millis(total: u64) -> TimegridResult<Self> {
        if total > MAX_TOTAL_MILLIS {
            return Err(TimegridError::invalid_argument(format!(
                "{total} ms exceeds the largest representable timecode 99:59:59.999"
            )));
        }
        Ok(Self {
            hours: (total / 3_600_000) as u8,
            minutes: ((total / 60_000) % 60) as u8,
            seconds: ((total / 1_000) % 60) as u8,
            milliseconds: (total % 1_000) as u16,
        })
    }

    /// Build from seconds, rounded to the nearest millisecond.
    pub fn from_seconds(seconds: f64) -> TimegridResult<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(TimegridError::invalid_argument(format!(
                "seconds must be finite and >= 0, got {seconds}"
            )));
        }
        Self::from_millis((seconds * 1_000.0).round() as u64)
    }

    /// Hours component.
    pub fn hours(self) -> u8 {
        self.hours
    }

    /// Minutes component.
    pub fn minutes(self) -> u8 {
        self.minutes
    }

    /// Seconds component.
    pub fn seconds(self) -> u8 {
        self.seconds
    }

    /// Milliseconds component.
    pub fn milliseconds(self) -> u16 {
        self.milliseconds
    }

    /// Total milliseconds since `00:00:00.000`.
    pub fn total_millis(self) -> u64 {
        u64::from(self.hours) * 3_600_000
            + u64::from(self.minutes) * 60_000
            + u64::from(self.seconds) * 1_000
            + u64::from(self.milliseconds)
    }

    /// Total seconds as a float.
    pub fn total_seconds(self) -> f64 {
        self.total_millis() as f64 / 1_000.0
    }

    /// Subtitle rendering, `HH:MM:SS,mmm`.
    pub fn to_subtitle_string(self) -> String {
        format!(
            "{:02}:{:02}:{:02},{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }

    /// Standard rendering, `HH:MM:SS.mmm`.
    pub fn to_standard_string(self) -> String {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }

    /// Frame-suffixed rendering `HH:MM:SS:FF` at `fps`.
    ///
    /// A sub-second part that rounds up to a full second carries into the seconds field.
    pub fn to_frame_string(self, fps: f64) -> TimegridResult<String> {
        render_frame_suffix(self.total_seconds(), fps)
    }

    /// Add a millisecond offset.
    pub fn add_millis(self, millis: u64) -> TimegridResult<Self> {
        let total = self
            .total_millis()
            .checked_add(millis)
            .ok_or_else(|| TimegridError::invalid_argument("timecode addition overflowed"))?;
        Self::from_millis(total)
    }

    /// Subtract a millisecond offset; fails if the result would be negative.
    pub fn sub_millis(self, millis: u64) -> TimegridResult<Self> {
        let total = self.total_millis().checked_sub(millis).ok_or_else(|| {
            TimegridError::underflow(format!(
                "{} - {millis} ms is negative",
                self.to_standard_string()
            ))
        })?;
        Self::from_millis(total)
    }

    /// Add another timecode.
    pub fn checked_add(self, other: Self) -> TimegridResult<Self> {
        self.add_millis(other.total_millis())
    }

    /// Subtract another timecode; fails if `other > self`.
    pub fn checked_sub(self, other: Self) -> TimegridResult<Self> {
        self.sub_millis(other.total_millis())
    }

    /// Parse any accepted grammar, using `fps` to resolve a frame suffix.
    pub fn parse_with_fps(text: &str, fps: f64) -> TimegridResult<Self> {
        let parsed = TimecodeText::parse(text)?;
        Self::from_seconds(parsed.to_seconds(fps)?)
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_standard_string())
    }
}

impl FromStr for TimeCode {
    type Err = TimegridError;

    /// Parses `HH:MM:SS.mmm`, `HH:MM:SS,mmm` and `HH:MM:SS`.
    ///
    /// Frame-suffixed text needs a frame rate; use [`TimeCode::parse_with_fps`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match TimecodeText::parse(s)? {
            TimecodeText::Millis(tc) => Ok(tc),
            TimecodeText::Frames { .. } => Err(TimegridError::malformed_timecode(format!(
                "'{s}' has a frame suffix; a frame rate is required"
            ))),
        }
    }
}

impl TryFrom<String> for TimeCode {
    type Error = TimegridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeCode> for String {
    fn from(value: TimeCode) -> Self {
        value.to_standard_string()
    }
}

/// A textual timecode after syntax checking, before frame-rate resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimecodeText {
    /// `HH:MM:SS[.,]mmm` or `HH:MM:SS`.
    Millis(TimeCode),
    /// `HH:MM:SS:FF`.
    Frames { whole: TimeCode, frames: u32 },
}

impl TimecodeText {
    pub(crate) fn parse(text: &str) -> TimegridResult<Self> {
        let trimmed = text.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [h, m, s, ff] => {
                let whole = TimeCode::new(
                    parse_field(trimmed, h, 2)?,
                    parse_field(trimmed, m, 2)?,
                    parse_field(trimmed, s, 2)?,
                    0,
                )?;
                let frames = parse_digits(trimmed, ff, 3)?;
                Ok(Self::Frames { whole, frames })
            }
            [h, m, rest] => {
                let (secs, frac) = match rest.find(['.', ',']) {
                    Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
                    None => (*rest, None),
                };
                let millis = match frac {
                    Some(frac) => parse_fraction_millis(trimmed, frac)?,
                    None => 0,
                };
                let tc = TimeCode::new(
                    parse_field(trimmed, h, 2)?,
                    parse_field(trimmed, m, 2)?,
                    parse_field(trimmed, secs, 2)?,
                    millis,
                )?;
                Ok(Self::Millis(tc))
            }
            _ => Err(TimegridError::malformed_timecode(format!(
                "'{text}' is not HH:MM:SS:FF or HH:MM:SS.mmm"
            ))),
        }
    }

    /// Seconds represented by this text at `fps`; validates `FF < fps`.
    pub(crate) fn to_seconds(self, fps: f64) -> TimegridResult<f64> {
        match self {
            Self::Millis(tc) => Ok(tc.total_seconds()),
            Self::Frames { whole, frames } => {
                let fps = ensure_fps(fps)?;
                if f64::from(frames) >= fps {
                    return Err(TimegridError::invalid_argument(format!(
                        "frame field {frames} must be < fps {fps}"
                    )));
                }
                Ok(whole.total_seconds() + f64::from(frames) / fps)
            }
        }
    }
}

/// Render `total_secs` as `HH:MM:SS:FF` at `fps`, carrying a rounded-up frame
/// field into the seconds.
pub(crate) fn render_frame_suffix(total_secs: f64, fps: f64) -> TimegridResult<String> {
    let fps = ensure_fps(fps)?;
    if !total_secs.is_finite() || total_secs < 0.0 {
        return Err(TimegridError::invalid_argument(format!(
            "seconds must be finite and >= 0, got {total_secs}"
        )));
    }
    let nominal = fps.ceil() as u64;
    let mut whole = total_secs.floor() as u64;
    let mut ff = ((total_secs - whole as f64) * fps).round() as u64;
    if ff >= nominal {
        ff = 0;
        whole += 1;
    }
    if whole > MAX_WHOLE_SECONDS {
        if whole == MAX_WHOLE_SECONDS + 1 && ff == 0 {
            // The carry pushed past 99:59:59; pin to the last frame instead.
            whole = MAX_WHOLE_SECONDS;
            ff = nominal - 1;
        } else {
            return Err(TimegridError::invalid_argument(format!(
                "{total_secs} s exceeds the largest representable timecode"
            )));
        }
    }
    Ok(format!(
        "{:02}:{:02}:{:02}:{:02}",
        whole / 3_600,
        (whole / 60) % 60,
        whole % 60,
        ff
    ))
}

fn out_of_range(field: &str, value: u64, max: u64) -> TimegridError {
    TimegridError::invalid_argument(format!("timecode {field} = {value} (max {max})"))
}

fn parse_digits(text: &str, field: &str, max_len: usize) -> TimegridResult<u32> {
    if field.is_empty() || field.len() > max_len || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimegridError::malformed_timecode(format!(
            "'{text}': bad field '{field}'"
        )));
    }
    field
        .parse::<u32>()
        .map_err(|e| TimegridError::malformed_timecode(format!("'{text}': {e}")))
}

fn parse_field(text: &str, field: &str, max_len: usize) -> TimegridResult<u8> {
    let v = parse_digits(text, field, max_len)?;
    // max_len <= 2 keeps this below 100.
    Ok(v as u8)
}

/// `"5"` -> 500, `"05"` -> 50, `"005"` -> 5.
fn parse_fraction_millis(text: &str, frac: &str) -> TimegridResult<u16> {
    let v = parse_digits(text, frac, 3)?;
    let scale = match frac.len() {
        1 => 100,
        2 => 10,
        _ => 1,
    };
    Ok((v * scale) as u16)
}

#[cfg(test)]
#[path = "../../tests/unit/time/timecode.rs"]
mod tests;
