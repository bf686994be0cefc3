use crate::foundation::core::ensure_fps;
use crate::foundation::error::{TimegridError, TimegridResult};

/// Exact frame rate `num/den`, always stored reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rational {
    /// Numerator (frames).
    pub num: u64,
    /// Denominator (seconds), non-zero.
    pub den: u64,
}

/// NTSC-family rates that are conventionally written with a truncated decimal.
const NTSC_RATES: [(f64, u64, u64); 3] = [
    (23.976, 24_000, 1_001),
    (29.97, 30_000, 1_001),
    (59.94, 60_000, 1_001),
];

const NTSC_MATCH_TOLERANCE: f64 = 0.005;

impl Rational {
    /// Create a reduced rational.
    pub fn new(num: u64, den: u64) -> TimegridResult<Self> {
        if num == 0 || den == 0 {
            return Err(TimegridError::invalid_argument(format!(
                "frame rate {num}/{den} must have non-zero terms"
            )));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Exact representation of a floating-point fps.
    ///
    /// 23.976, 29.97 and 59.94 map to their `/1001` forms; anything else is
    /// approximated to 1/1000 precision.
    pub fn from_fps(fps: f64) -> TimegridResult<Self> {
        let fps = ensure_fps(fps)?;
        for (nominal, num, den) in NTSC_RATES {
            let exact = num as f64 / den as f64;
            if (fps - nominal).abs() < NTSC_MATCH_TOLERANCE
                || (fps - exact).abs() < NTSC_MATCH_TOLERANCE
            {
                return Self::new(num, den);
            }
        }
        let millis = (fps * 1_000.0).round();
        if millis < 1.0 || millis > u64::MAX as f64 {
            return Err(TimegridError::invalid_argument(format!(
                "fps {fps} cannot be represented at 1/1000 precision"
            )));
        }
        Self::new(millis as u64, 1_000)
    }

    /// Floating-point value.
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Least common multiple of two rates: the smallest rate on whose frame grid
    /// both inputs land on integer frames.
    pub fn lcm(self, other: Self) -> TimegridResult<Self> {
        // lcm(a/b, c/d) = lcm(a, c) / gcd(b, d) for reduced fractions.
        let num = lcm(self.num, other.num).ok_or_else(|| {
            TimegridError::invalid_argument(format!(
                "common rate of {}/{} and {}/{} overflows",
                self.num, self.den, other.num, other.den
            ))
        })?;
        Self::new(num, gcd(self.den, other.den))
    }
}

/// Stateless helpers for retiming between frame rates.
pub struct FrameRateAdapter;

impl FrameRateAdapter {
    /// Lowest rate at which both `a` and `b` fall on integer frame boundaries.
    pub fn common_fps(a: f64, b: f64) -> TimegridResult<Rational> {
        Rational::from_fps(a)?.lcm(Rational::from_fps(b)?)
    }

    /// `true` when every `src_fps` frame lands exactly on a `dst_fps` frame, so
    /// a `src -> dst -> src` round trip is lossless.
    pub fn is_lossless(src_fps: f64, dst_fps: f64) -> TimegridResult<bool> {
        let dst = Rational::from_fps(dst_fps)?;
        Ok(Self::common_fps(src_fps, dst_fps)? == dst)
    }

    /// Advisory quality-loss estimate in `[0, 1]` for retiming `src_fps -> dst_fps`.
    ///
    /// Zero when upsampling, near zero for the 24/23.976, 30/29.97 and 60/59.94
    /// pairs. Otherwise grows with `1 - dst/src` and steepens below a 0.5 ratio.
    pub fn estimate_quality_loss(src_fps: f64, dst_fps: f64) -> TimegridResult<f64> {
        let src = ensure_fps(src_fps)?;
        let dst = ensure_fps(dst_fps)?;
        if dst >= src {
            return Ok(0.0);
        }
        if is_ntsc_pulldown_pair(src, dst) {
            return Ok(0.001);
        }
        let ratio = dst / src;
        let loss = if ratio >= 0.5 {
            (1.0 - ratio) * 0.2
        } else {
            0.1 + (0.5 - ratio) * 1.8
        };
        Ok(loss.clamp(0.0, 1.0))
    }
}

fn is_ntsc_pulldown_pair(src: f64, dst: f64) -> bool {
    NTSC_RATES.iter().any(|&(nominal, num, _)| {
        let integer = (num / 1_000) as f64;
        (src - integer).abs() < NTSC_MATCH_TOLERANCE && (dst - nominal).abs() < NTSC_MATCH_TOLERANCE
    })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    (a / gcd(a, b)).checked_mul(b)
}

#[cfg(test)]
#[path = "../../tests/unit/time/framerate.rs"]
mod tests;
