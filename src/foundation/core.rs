use crate::foundation::error::{TimegridError, TimegridResult};

/// Tolerance used when comparing frame positions stored as `f64`.
pub const FRAME_EPSILON: f64 = 1e-9;

/// Policy for turning a real-valued frame count into an integer frame index.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMethod {
    /// Round half away from zero.
    #[default]
    Round,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
}

impl RoundingMethod {
    /// Apply the policy to `value`.
    pub fn apply(self, value: f64) -> i64 {
        let v = match self {
            Self::Round => value.round(),
            Self::Floor => value.floor(),
            Self::Ceil => value.ceil(),
        };
        v as i64
    }
}

/// Validate a frame rate: finite and strictly positive.
pub fn ensure_fps(fps: f64) -> TimegridResult<f64> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(TimegridError::invalid_argument(format!(
            "fps must be finite and > 0, got {fps}"
        )));
    }
    Ok(fps)
}

/// Validate a time/frame value: finite and `>= 0`.
pub fn ensure_non_negative(what: &str, value: f64) -> TimegridResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(TimegridError::invalid_argument(format!(
            "{what} must be finite and >= 0, got {value}"
        )));
    }
    Ok(value)
}

/// Duration of one frame in seconds. `fps` must already be validated.
pub(crate) fn frame_duration(fps: f64) -> f64 {
    1.0 / fps
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
