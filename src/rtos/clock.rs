//! Monotonic tick clock with an attached wall clock.

use core::cell::Cell;
use critical_section::Mutex;

use super::time::{Duration, TickRate, Timestamp};

/// Seconds and milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WallTime {
    pub seconds: u32,
    pub millis: u16,
}

#[derive(Clone, Copy)]
struct ClockState {
    ticks: u32,
    /// Ticks into the current wall-clock second
    sub_ticks: u16,
    seconds: u32,
}

/// Time source advanced by the periodic tick interrupt.
///
/// The tick counter and the wall clock are updated together inside one
/// critical section, so [`current`](Clock::current) and
/// [`wall_time`](Clock::wall_time) never observe a half-applied tick.
pub struct Clock {
    state: Mutex<Cell<ClockState>>,
    rate: TickRate,
}

impl Clock {
    pub const fn new(rate: TickRate) -> Self {
        Self::starting_at(rate, Timestamp::ZERO)
    }

    /// A clock whose tick counter starts at `start` rather than zero.
    pub const fn starting_at(rate: TickRate, start: Timestamp) -> Self {
        Self {
            state: Mutex::new(Cell::new(ClockState {
                ticks: start.ticks(),
                sub_ticks: 0,
                seconds: 0,
            })),
            rate,
        }
    }

    /// Advance by exactly one tick. Called from the tick interrupt.
    #[inline]
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.ticks = state.ticks.wrapping_add(1);
            state.sub_ticks += 1;
            if state.sub_ticks >= self.rate.ticks_per_second() {
                state.sub_ticks = 0;
                state.seconds = state.seconds.wrapping_add(1);
            }
            cell.set(state);
        })
    }

    pub fn current(&self) -> Timestamp {
        critical_section::with(|cs| Timestamp::from_ticks(self.state.borrow(cs).get().ticks))
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// `ts` advanced by a duration in calendar units.
    pub fn increment(
        &self,
        ts: Timestamp,
        days: u32,
        hours: u32,
        minutes: u32,
        seconds: u32,
    ) -> Timestamp {
        ts.increment(self.rate.duration(days, hours, minutes, seconds))
    }

    /// Ticks elapsed since `since`, modulo the counter range.
    pub fn elapsed(&self, since: Timestamp) -> Duration {
        self.current().since(since)
    }

    /// Set the wall clock. Does not touch the tick counter, so pending
    /// alarms are unaffected.
    pub fn set_time(&self, unix_seconds: u32, millis: u16) {
        let millis = millis.min(999) as u32;
        let sub_ticks = (millis * self.rate.ticks_per_second() as u32 / 1000) as u16;
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.seconds = unix_seconds;
            state.sub_ticks = sub_ticks;
            cell.set(state);
        });
        log::debug!("wall clock set to {}.{:03}", unix_seconds, millis);
    }

    pub fn wall_time(&self) -> WallTime {
        let state = critical_section::with(|cs| self.state.borrow(cs).get());
        let millis =
            (state.sub_ticks as u32 * 1000 / self.rate.ticks_per_second() as u32) as u16;
        WallTime {
            seconds: state.seconds,
            millis,
        }
    }
}
