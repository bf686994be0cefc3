/// Convenience result type used across timegrid.
pub type TimegridResult<T> = Result<T, TimegridError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Structural timeline defects (inverted ranges, zero-length clips, bad fps) are
/// not errors; they are repaired by
/// [`TimebaseUnifier::detect_and_fix_timebase_issues`](crate::TimebaseUnifier::detect_and_fix_timebase_issues).
#[derive(thiserror::Error, Debug)]
pub enum TimegridError {
    /// Negative time or frames, non-positive fps, out-of-range timecode fields.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unparseable textual timecode or time-range string.
    #[error("malformed timecode: {0}")]
    MalformedTimecode(String),

    /// Subtraction or decrement that would go below zero.
    #[error("arithmetic underflow: {0}")]
    ArithmeticUnderflow(String),

    /// Errors when serializing or deserializing timelines and configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TimegridError {
    /// Build a [`TimegridError::InvalidArgument`] value.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build a [`TimegridError::MalformedTimecode`] value.
    pub fn malformed_timecode(msg: impl Into<String>) -> Self {
        Self::MalformedTimecode(msg.into())
    }

    /// Build a [`TimegridError::ArithmeticUnderflow`] value.
    pub fn underflow(msg: impl Into<String>) -> Self {
        Self::ArithmeticUnderflow(msg.into())
    }

    /// Build a [`TimegridError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
