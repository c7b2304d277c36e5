//! Time bases and timestamp arithmetic.
//!
//! Every link (and every aligner input) declares a [`TimeBase`]: the rational
//! duration, in seconds, of one timestamp tick. Frame timestamps are plain
//! `i64` tick counts and only become comparable across streams after
//! [`rescale`]-ing them into a common base.

use crate::error::{Error, Result};

/// A reduced positive rational: the duration in seconds of one tick.
///
/// A 90 kHz MPEG clock is `TimeBase::new(1, 90_000)`; a 25 fps frame clock is
/// `TimeBase::new(1, 25)`. Construction reduces the fraction, so two bases
/// compare equal whenever they denote the same tick duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    num: i64,
    den: i64,
}

impl TimeBase {
    /// One tick per second.
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// Millisecond ticks.
    pub const MILLIS: Self = Self { num: 1, den: 1_000 };

    /// Microsecond ticks.
    pub const MICROS: Self = Self { num: 1, den: 1_000_000 };

    /// Nanosecond ticks.
    pub const NANOS: Self = Self { num: 1, den: 1_000_000_000 };

    /// Create a time base of `num/den` seconds per tick.
    ///
    /// The fraction is reduced. Returns `InvalidData` if either term is
    /// non-positive.
    pub fn new(num: i64, den: i64) -> Result<Self> {
        if num <= 0 || den <= 0 {
            return Err(Error::InvalidData(format!(
                "time base must be positive, got {num}/{den}"
            )));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Numerator of the reduced fraction.
    #[inline]
    pub const fn num(self) -> i64 {
        self.num
    }

    /// Denominator of the reduced fraction.
    #[inline]
    pub const fn den(self) -> i64 {
        self.den
    }

    /// The coarsest base whose ticks exactly represent ticks of both inputs.
    ///
    /// This is the rational gcd: `gcd(a.num, b.num) / lcm(a.den, b.den)`.
    /// The aligner uses it to compare timestamps from heterogeneous streams
    /// without rounding error.
    pub fn common(a: Self, b: Self) -> Self {
        let num = gcd(a.num, b.num);
        let den = (a.den / gcd(a.den, b.den)).saturating_mul(b.den);
        let g = gcd(num, den);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    /// Seconds per tick as a float, for display and rough math only.
    pub fn as_secs_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MICROS
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Convert `pts` ticks from one base to another.
///
/// Computed in `i128`, rounding half away from zero, so conversions between
/// exactly-representable bases are lossless and the rest are nearest-tick.
pub fn rescale(pts: i64, from: TimeBase, to: TimeBase) -> i64 {
    if from == to {
        return pts;
    }
    let num = pts as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded as i64
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_reduces() {
        let tb = TimeBase::new(2, 50).unwrap();
        assert_eq!(tb.num(), 1);
        assert_eq!(tb.den(), 25);
        assert_eq!(tb, TimeBase::new(4, 100).unwrap());
    }

    #[test]
    fn test_time_base_rejects_non_positive() {
        assert!(TimeBase::new(0, 1).is_err());
        assert!(TimeBase::new(1, 0).is_err());
        assert!(TimeBase::new(-1, 25).is_err());
    }

    #[test]
    fn test_rescale_identity() {
        assert_eq!(rescale(1234, TimeBase::MILLIS, TimeBase::MILLIS), 1234);
    }

    #[test]
    fn test_rescale_exact() {
        // 40 ms == 40_000 us
        assert_eq!(rescale(40, TimeBase::MILLIS, TimeBase::MICROS), 40_000);
        // 3 frames at 25 fps == 120 ms
        let fps25 = TimeBase::new(1, 25).unwrap();
        assert_eq!(rescale(3, fps25, TimeBase::MILLIS), 120);
    }

    #[test]
    fn test_rescale_rounds_to_nearest() {
        // 1 tick of 1/3 s == 333.33 ms, rounds to 333
        let third = TimeBase::new(1, 3).unwrap();
        assert_eq!(rescale(1, third, TimeBase::MILLIS), 333);
        assert_eq!(rescale(2, third, TimeBase::MILLIS), 667);
        // Negative pts round away from zero symmetrically.
        assert_eq!(rescale(-1, third, TimeBase::MILLIS), -333);
        assert_eq!(rescale(-2, third, TimeBase::MILLIS), -667);
    }

    #[test]
    fn test_common_base_represents_both() {
        let fps25 = TimeBase::new(1, 25).unwrap();
        let audio = TimeBase::new(1, 48_000).unwrap();
        let common = TimeBase::common(fps25, audio);

        // Both tick kinds must map to whole common ticks and back.
        for pts in [0i64, 1, 7, 100] {
            let in_common = rescale(pts, fps25, common);
            assert_eq!(rescale(in_common, common, fps25), pts);
            let in_common = rescale(pts, audio, common);
            assert_eq!(rescale(in_common, common, audio), pts);
        }
    }

    #[test]
    fn test_common_base_of_equal_bases() {
        assert_eq!(
            TimeBase::common(TimeBase::MILLIS, TimeBase::MILLIS),
            TimeBase::MILLIS
        );
    }
}
