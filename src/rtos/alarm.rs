//! Alarm records and the listener capability they notify.

use super::time::{Duration, Timestamp};

/// Receives alarm notifications from a [`Scheduler`](super::Scheduler).
///
/// Called from the main loop, never from interrupt context, so
/// implementations may take their time and may add or remove alarms on the
/// scheduler that is calling them.
pub trait AlarmListener: Sync {
    fn alarm(&self, alarm: &Alarm);
}

/// The alarm that fired, as seen by its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm {
    pub(crate) when: Timestamp,
    pub(crate) interval: Duration,
    pub(crate) slot: u8,
}

impl Alarm {
    /// The due time that was crossed. For a late alarm this is earlier
    /// than the current time.
    pub fn when(&self) -> Timestamp {
        self.when
    }

    /// Repeat interval, zero for a one-shot alarm.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_repeating(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Index of the scheduler slot holding the alarm.
    pub fn slot(&self) -> u8 {
        self.slot
    }
}

/// An armed alarm as held by the scheduler table.
#[derive(Clone, Copy)]
pub(crate) struct Entry<'a> {
    pub listener: &'a dyn AlarmListener,
    pub due: Timestamp,
    pub interval: Duration,
}

impl<'a> Entry<'a> {
    /// Zero-sized listeners of different types may share an address, so
    /// for those the vtable has to match as well.
    #[allow(ambiguous_wide_pointer_comparisons)]
    pub fn belongs_to(&self, listener: &dyn AlarmListener) -> bool {
        if !core::ptr::addr_eq(self.listener, listener) {
            return false;
        }
        core::mem::size_of_val(listener) != 0 || core::ptr::eq(self.listener, listener)
    }
}
