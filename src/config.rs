use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::ensure_fps;
use crate::foundation::error::{TimegridError, TimegridResult};
use crate::time::timebase::{PlatformSetting, PlatformType};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Engine-wide defaults, passed explicitly to every component that needs them.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a valid
/// configuration.
pub struct EngineConfig {
    /// Replacement fps for timelines whose fps is out of range.
    pub default_fps: f64,
    /// Largest fps accepted as plausible by the repair pass.
    pub max_fps: f64,
    /// Durations above this (seconds) are reported as suspicious.
    pub max_duration_secs: f64,
    /// Platform used when a timeline does not name its source/target platform.
    pub platform: PlatformSetting,
    /// Largest gap/overlap (frames) healed by boundary compensation.
    pub boundary_tolerance_frames: f64,
    /// Allowed accumulated drift (frames) for timestamp sequences.
    pub drift_threshold_frames: f64,
    /// Fraction of a frame within which lenient grid snapping applies.
    pub lenient_snap_fraction: f64,
    /// Distance (seconds) under which a cut counts as aligned to a keyframe.
    pub alignment_tolerance_secs: f64,
    /// Minimum spacing (seconds) between keyframes derived from a timeline.
    pub keyframe_min_distance_secs: f64,
    /// Spacing (seconds) of the uniform keyframe grid fallback.
    pub uniform_keyframe_interval_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_fps: 30.0,
            max_fps: 1000.0,
            max_duration_secs: 86_400.0,
            platform: PlatformSetting::Auto,
            boundary_tolerance_frames: 1.0,
            drift_threshold_frames: 0.5,
            lenient_snap_fraction: 0.02,
            alignment_tolerance_secs: 0.1,
            keyframe_min_distance_secs: 0.5,
            uniform_keyframe_interval_secs: 5.0,
        }
    }
}

impl EngineConfig {
    /// Check that every field is usable.
    pub fn validate(&self) -> TimegridResult<()> {
        ensure_fps(self.default_fps)?;
        if self.default_fps > self.max_fps {
            return Err(TimegridError::invalid_argument(format!(
                "default_fps {} exceeds max_fps {}",
                self.default_fps, self.max_fps
            )));
        }
        let non_negative = [
            ("max_duration_secs", self.max_duration_secs),
            ("boundary_tolerance_frames", self.boundary_tolerance_frames),
            ("drift_threshold_frames", self.drift_threshold_frames),
            ("alignment_tolerance_secs", self.alignment_tolerance_secs),
            ("keyframe_min_distance_secs", self.keyframe_min_distance_secs),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(TimegridError::invalid_argument(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        if !(0.0..=0.5).contains(&self.lenient_snap_fraction) {
            return Err(TimegridError::invalid_argument(format!(
                "lenient_snap_fraction must be in [0, 0.5], got {}",
                self.lenient_snap_fraction
            )));
        }
        if !self.uniform_keyframe_interval_secs.is_finite()
            || self.uniform_keyframe_interval_secs <= 0.0
        {
            return Err(TimegridError::invalid_argument(
                "uniform_keyframe_interval_secs must be > 0",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(s: &str) -> TimegridResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| TimegridError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: &Path) -> TimegridResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Concrete platform for this configuration.
    pub fn platform(&self) -> PlatformType {
        self.platform.resolve()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
