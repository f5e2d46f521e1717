//! Tick-based time values.
//!
//! A [`Timestamp`] is a `u32` tick count that wraps at 2^32. Two timestamps
//! compare correctly as long as they are less than 2^31 ticks apart; at the
//! default 1 kHz tick that horizon is a little under 25 days, which bounds
//! how far ahead an alarm may be scheduled. Ordering across larger
//! separations is undefined.

use core::fmt;
use ufmt::{uDisplay, uWrite, uwrite, Formatter};

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

/// A point on the wrapping tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u32);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Advance by a duration, wrapping at the counter modulus.
    pub const fn increment(self, by: Duration) -> Self {
        Self(self.0.wrapping_add(by.0))
    }

    /// Ticks from `earlier` to `self`, modulo 2^32.
    pub const fn since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0))
    }

    /// `self >= other` under the half-horizon rule.
    #[inline]
    pub const fn is_at_or_after(self, other: Timestamp) -> bool {
        greater_than_or_equal(self, other)
    }

    #[inline]
    pub const fn is_before(self, other: Timestamp) -> bool {
        less_than(self, other)
    }
}

/// Wraparound-safe `a >= b`.
///
/// The difference is taken modulo 2^32 and read as signed, so `a` is at or
/// after `b` whenever it lies within the half of the counter range that
/// follows `b`.
#[inline]
pub const fn greater_than_or_equal(a: Timestamp, b: Timestamp) -> bool {
    (a.0.wrapping_sub(b.0) as i32) >= 0
}

/// Wraparound-safe `a < b`.
#[inline]
pub const fn less_than(a: Timestamp, b: Timestamp) -> bool {
    !greater_than_or_equal(a, b)
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl uDisplay for Timestamp {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        uwrite!(f, "@{}", self.0)
    }
}

/// A span of ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Duration(u32);

impl Duration {
    pub const ZERO: Self = Self(0);

    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_add(self, other: Duration) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl core::ops::Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.wrapping_add(rhs.0))
    }
}

impl core::ops::Mul<u32> for Duration {
    type Output = Duration;

    fn mul(self, rhs: u32) -> Duration {
        Duration(self.0.wrapping_mul(rhs))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

impl uDisplay for Duration {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        uwrite!(f, "{}ticks", self.0)
    }
}

/// Frequency of the tick interrupt.
///
/// Converts human units into [`Duration`]s. Conversions round down and
/// saturate at `u32::MAX` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickRate {
    ticks_per_second: u16,
}

impl TickRate {
    /// # Panics
    ///
    /// On a zero rate, which is a configuration error caught at compile time
    /// when used in a `const`.
    pub const fn new(ticks_per_second: u16) -> Self {
        assert!(ticks_per_second > 0, "tick rate must be non-zero");
        Self { ticks_per_second }
    }

    /// Rate produced by a timer running in CTC mode.
    ///
    /// `top` is the compare value, so the timer overflows every
    /// `prescaler * (top + 1)` CPU cycles. Returns `None` if that is not a
    /// whole number of ticks per second in the `u16` range.
    pub const fn from_timer(cpu_hz: u32, prescaler: u16, top: u16) -> Option<Self> {
        if prescaler == 0 {
            return None;
        }
        let divisor = prescaler as u32 * (top as u32 + 1);
        let rate = cpu_hz / divisor;
        if rate == 0 || rate > u16::MAX as u32 {
            return None;
        }
        Some(Self {
            ticks_per_second: rate as u16,
        })
    }

    pub const fn ticks_per_second(self) -> u16 {
        self.ticks_per_second
    }

    const fn scale(self, amount: u32, per: u32) -> Duration {
        let ticks = amount as u64 * self.ticks_per_second as u64 / per as u64;
        if ticks > u32::MAX as u64 {
            Duration(u32::MAX)
        } else {
            Duration(ticks as u32)
        }
    }

    pub const fn millis(self, ms: u32) -> Duration {
        self.scale(ms, 1000)
    }

    pub const fn seconds(self, seconds: u32) -> Duration {
        self.scale(seconds, 1)
    }

    /// A duration given in calendar units. Carries between units are exact;
    /// the total saturates rather than wrapping.
    pub const fn duration(self, days: u32, hours: u32, minutes: u32, seconds: u32) -> Duration {
        let total = days as u64 * SECONDS_PER_DAY as u64
            + hours as u64 * SECONDS_PER_HOUR as u64
            + minutes as u64 * SECONDS_PER_MINUTE as u64
            + seconds as u64;
        let ticks = total * self.ticks_per_second as u64;
        if ticks > u32::MAX as u64 {
            Duration(u32::MAX)
        } else {
            Duration(ticks as u32)
        }
    }

    /// Whole milliseconds covered by a duration.
    pub const fn to_millis(self, duration: Duration) -> u32 {
        (duration.0 as u64 * 1000 / self.ticks_per_second as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_without_wrap() {
        let a = Timestamp::from_ticks(100);
        let b = Timestamp::from_ticks(200);
        assert!(greater_than_or_equal(b, a));
        assert!(!greater_than_or_equal(a, b));
        assert!(greater_than_or_equal(a, a));
        assert!(less_than(a, b));
    }

    #[test]
    fn comparison_across_wrap() {
        let before = Timestamp::from_ticks(u32::MAX - 9);
        let after = before.increment(Duration::from_ticks(20));
        assert_eq!(after.ticks(), 10);
        assert!(after.is_at_or_after(before));
        assert!(before.is_before(after));
        assert_eq!(after.since(before), Duration::from_ticks(20));
    }

    #[test]
    fn ordering_holds_up_to_half_the_horizon() {
        let base = Timestamp::from_ticks(0xF000_0000);
        for step in [1u32, 1000, 0x1000_0000, 0x7FFF_FFFF] {
            let later = base.increment(Duration::from_ticks(step));
            assert!(later.is_at_or_after(base), "step {step:#x}");
            assert!(base.is_before(later), "step {step:#x}");
        }
    }

    #[test]
    fn rate_conversions() {
        let rate = TickRate::new(1000);
        assert_eq!(rate.millis(20), Duration::from_ticks(20));
        assert_eq!(rate.seconds(3), Duration::from_ticks(3000));
        assert_eq!(rate.duration(1, 1, 1, 1), Duration::from_ticks(90_061_000));
        assert_eq!(rate.to_millis(Duration::from_ticks(1500)), 1500);

        let slow = TickRate::new(250);
        assert_eq!(slow.millis(10), Duration::from_ticks(2));
        assert_eq!(slow.to_millis(Duration::from_ticks(2)), 8);
    }

    #[test]
    fn duration_saturates() {
        let rate = TickRate::new(1000);
        assert_eq!(rate.duration(100, 0, 0, 0), Duration::from_ticks(u32::MAX));
    }

    #[test]
    fn rate_from_timer_configuration() {
        // 16 MHz, /64, compare at 249 -> 1 kHz
        assert_eq!(
            TickRate::from_timer(16_000_000, 64, 249),
            Some(TickRate::new(1000))
        );
        assert_eq!(TickRate::from_timer(16_000_000, 0, 249), None);
        assert_eq!(TickRate::from_timer(16_000_000, 1, 0), None);
    }
}
