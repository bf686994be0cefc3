use std::fmt;
use std::str::FromStr;

use crate::foundation::core::ensure_fps;
use crate::foundation::error::{TimegridError, TimegridResult};

/// Named frame-rate profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimebaseStandard {
    /// Cinema, 24 fps.
    Movie,
    /// PAL video, 25 fps.
    Pal,
    /// NTSC video, 29.97 fps.
    Ntsc,
    /// NTSC drop-frame, 29.97 fps.
    NtscDrop,
    /// Film transferred to NTSC, 23.976 fps.
    Film,
    /// Digital video, 30 fps.
    Digital,
    /// Web delivery, 30 fps.
    Web,
    /// Caller-supplied rate.
    Custom,
}

impl TimebaseStandard {
    /// All variants in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Movie,
        Self::Pal,
        Self::Ntsc,
        Self::NtscDrop,
        Self::Film,
        Self::Digital,
        Self::Web,
        Self::Custom,
    ];

    /// Canonical fps, `None` for [`TimebaseStandard::Custom`].
    pub fn canonical_fps(self) -> Option<f64> {
        match self {
            Self::Movie => Some(24.0),
            Self::Pal => Some(25.0),
            Self::Ntsc | Self::NtscDrop => Some(29.97),
            Self::Film => Some(23.976),
            Self::Digital | Self::Web => Some(30.0),
            Self::Custom => None,
        }
    }

    /// Whether timecodes in this standard are conventionally written `HH:MM:SS:FF`.
    pub fn is_frame_oriented(self) -> bool {
        matches!(self, Self::Movie | Self::Film | Self::Ntsc | Self::NtscDrop)
    }

    /// Stable lowercase name, also the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Pal => "pal",
            Self::Ntsc => "ntsc",
            Self::NtscDrop => "ntsc_drop",
            Self::Film => "film",
            Self::Digital => "digital",
            Self::Web => "web",
            Self::Custom => "custom",
        }
    }
}

/// Resolve the fps of `timebase`; `custom_fps` is required for `Custom` and ignored otherwise.
pub fn get_timebase_fps(
    timebase: TimebaseStandard,
    custom_fps: Option<f64>,
) -> TimegridResult<f64> {
    match (timebase.canonical_fps(), custom_fps) {
        (Some(fps), _) => Ok(fps),
        (None, Some(custom)) => ensure_fps(custom),
        (None, None) => Err(TimegridError::invalid_argument(
            "custom timebase requires an explicit fps",
        )),
    }
}

impl fmt::Display for TimebaseStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimebaseStandard {
    type Err = TimegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| TimegridError::invalid_argument(format!("unknown timebase '{s}'")))
    }
}

/// Operating environment whose clock resolution bounds representable time offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// Windows desktop.
    Windows,
    /// macOS desktop.
    MacOs,
    /// Linux desktop.
    Linux,
    /// iOS devices.
    Ios,
    /// Android devices.
    Android,
    /// Browser runtime.
    Web,
}

impl PlatformType {
    /// All variants in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Windows,
        Self::MacOs,
        Self::Linux,
        Self::Ios,
        Self::Android,
        Self::Web,
    ];

    /// Default timebase used by editing tools on this platform.
    pub fn default_timebase(self) -> TimebaseStandard {
        match self {
            Self::Windows | Self::MacOs => TimebaseStandard::Ntsc,
            Self::Linux => TimebaseStandard::Pal,
            Self::Ios | Self::Android => TimebaseStandard::Digital,
            Self::Web => TimebaseStandard::Web,
        }
    }

    /// Clock ticks per second: millisecond, microsecond or nanosecond granularity.
    pub fn time_resolution(self) -> u64 {
        match self {
            Self::Windows | Self::Web => 1_000,
            Self::MacOs | Self::Linux | Self::Android => 1_000_000,
            Self::Ios => 1_000_000_000,
        }
    }

    /// Map a `std::env::consts::OS` value; unknown systems are treated as a browser runtime.
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "ios" => Self::Ios,
            "android" => Self::Android,
            "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Self::Linux,
            _ => Self::Web,
        }
    }

    /// Stable lowercase name, also the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = TimegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| TimegridError::invalid_argument(format!("unknown platform '{s}'")))
    }
}

/// Probe the running environment once.
pub fn detect_platform() -> PlatformType {
    PlatformType::from_os(std::env::consts::OS)
}

/// Default `(timebase, fps)` for `platform`.
pub fn get_platform_timebase(platform: PlatformType) -> (TimebaseStandard, f64) {
    let timebase = platform.default_timebase();
    // Platform defaults are never `Custom`.
    let fps = timebase.canonical_fps().unwrap_or(30.0);
    (timebase, fps)
}

/// Platform selection as written in configuration: `"auto"` or a platform name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformSetting {
    /// Probe the environment at the orchestration boundary.
    #[default]
    Auto,
    /// Use this platform.
    Fixed(PlatformType),
}

impl PlatformSetting {
    /// Resolve to a concrete platform, probing the environment for `Auto`.
    pub fn resolve(self) -> PlatformType {
        match self {
            Self::Auto => detect_platform(),
            Self::Fixed(p) => p,
        }
    }
}

impl FromStr for PlatformSetting {
    type Err = TimegridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse().map(Self::Fixed)
    }
}

impl TryFrom<String> for PlatformSetting {
    type Error = TimegridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlatformSetting> for String {
    fn from(value: PlatformSetting) -> Self {
        match value {
            PlatformSetting::Auto => "auto".to_owned(),
            PlatformSetting::Fixed(p) => p.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/time/timebase.rs"]
mod tests;
