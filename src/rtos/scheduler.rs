//! Alarm scheduler driven by the tick clock
//!
//! The tick interrupt only advances the [`Clock`]. Due alarms are found and
//! fired by [`Scheduler::handle_events`], which runs in the main loop.

use core::cell::RefCell;
use critical_section::Mutex;

use super::alarm::{Alarm, AlarmListener, Entry};
use super::clock::Clock;
use super::time::{Duration, Timestamp};
use crate::config::ALARM_CAPACITY;
use crate::os::EventHandler;
use crate::Error;

pub struct Scheduler<'a, const N: usize = ALARM_CAPACITY> {
    clock: &'a Clock,
    entries: Mutex<RefCell<[Option<Entry<'a>>; N]>>,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    pub const fn new(clock: &'a Clock) -> Self {
        Self {
            clock,
            entries: Mutex::new(RefCell::new([None; N])),
        }
    }

    pub fn clock(&self) -> &'a Clock {
        self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.current()
    }

    /// Fire `listener` once, `delay` ticks from now.
    pub fn add_alarm(&self, listener: &'a dyn AlarmListener, delay: Duration) -> Result<(), Error> {
        self.add_alarm_at(listener, self.now().increment(delay), Duration::ZERO)
    }

    /// Fire `listener` after `delay` and then every `interval`.
    pub fn add_repeating_alarm(
        &self,
        listener: &'a dyn AlarmListener,
        delay: Duration,
        interval: Duration,
    ) -> Result<(), Error> {
        self.add_alarm_at(listener, self.now().increment(delay), interval)
    }

    /// Arm an alarm at an absolute time. A zero `interval` makes it one-shot.
    ///
    /// The table has fixed capacity; when it is full the alarm is not armed
    /// and [`Error::CapacityExceeded`] is returned.
    pub fn add_alarm_at(
        &self,
        listener: &'a dyn AlarmListener,
        when: Timestamp,
        interval: Duration,
    ) -> Result<(), Error> {
        match self.arm(listener, when, interval) {
            Ok(index) => {
                log::debug!("alarm armed in slot {} for {}", index, when);
                Ok(())
            }
            Err(err) => {
                log::warn!("alarm table full ({} slots)", N);
                Err(err)
            }
        }
    }

    /// Disarm the first alarm belonging to `listener`.
    ///
    /// Returns whether one was found; removing an absent alarm is a no-op.
    /// A callback already in progress is not interrupted.
    pub fn remove_alarm(&self, listener: &dyn AlarmListener) -> bool {
        let removed = self.disarm(listener);
        if removed {
            log::debug!("alarm removed");
        }
        removed
    }

    /// Table insert without logging, usable from interrupt context.
    pub(crate) fn arm(
        &self,
        listener: &'a dyn AlarmListener,
        when: Timestamp,
        interval: Duration,
    ) -> Result<usize, Error> {
        critical_section::with(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            let (index, free) = entries
                .iter_mut()
                .enumerate()
                .find(|(_, e)| e.is_none())
                .ok_or(Error::CapacityExceeded)?;
            *free = Some(Entry {
                listener,
                due: when,
                interval,
            });
            Ok(index)
        })
    }

    /// Table removal without logging, usable from interrupt context.
    pub(crate) fn disarm(&self, listener: &dyn AlarmListener) -> bool {
        critical_section::with(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            match entries
                .iter_mut()
                .find(|e| e.as_ref().map_or(false, |e| e.belongs_to(listener)))
            {
                Some(slot) => {
                    *slot = None;
                    true
                }
                None => false,
            }
        })
    }

    pub fn is_armed(&self, listener: &dyn AlarmListener) -> bool {
        critical_section::with(|cs| {
            self.entries
                .borrow_ref(cs)
                .iter()
                .flatten()
                .any(|e| e.belongs_to(listener))
        })
    }

    /// Number of armed alarms.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.entries.borrow_ref(cs).iter().flatten().count())
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&self) {
        critical_section::with(|cs| {
            *self.entries.borrow_ref_mut(cs) = [None; N];
        });
    }

    /// Fire every alarm that is due at the current time.
    ///
    /// Slots are visited in index order against a single snapshot of the
    /// clock. Each slot is claimed inside a short critical section and its
    /// listener is called after the section ends, so listeners may add or
    /// remove alarms freely. A repeating alarm is re-armed at its old due
    /// time plus its interval and fires at most once per pass, so an overdue
    /// alarm catches up over successive passes without drifting.
    ///
    /// Returns the number of alarms fired.
    pub fn handle_events(&self) -> usize {
        let now = self.now();
        let mut fired = 0;

        for index in 0..N {
            let due = critical_section::with(|cs| {
                let mut entries = self.entries.borrow_ref_mut(cs);
                let slot = &mut entries[index];
                let entry = slot.as_mut()?;
                if !now.is_at_or_after(entry.due) {
                    return None;
                }
                let alarm = Alarm {
                    when: entry.due,
                    interval: entry.interval,
                    slot: index as u8,
                };
                let listener = entry.listener;
                if entry.interval.is_zero() {
                    *slot = None;
                } else {
                    entry.due = entry.due.increment(entry.interval);
                }
                Some((listener, alarm))
            });

            if let Some((listener, alarm)) = due {
                log::trace!("alarm {} fired at {}", index, now);
                listener.alarm(&alarm);
                fired += 1;
            }
        }

        fired
    }
}

impl<const N: usize> EventHandler for Scheduler<'_, N> {
    fn handle_events(&self) {
        Scheduler::handle_events(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtos::TickRate;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        fired: StdMutex<Vec<Timestamp>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.fired.lock().unwrap().len()
        }
    }

    impl AlarmListener for Recorder {
        fn alarm(&self, alarm: &Alarm) {
            self.fired.lock().unwrap().push(alarm.when());
        }
    }

    fn advance<const N: usize>(clock: &Clock, scheduler: &Scheduler<'_, N>, ticks: u32) {
        for _ in 0..ticks {
            clock.tick();
            scheduler.handle_events();
        }
    }

    #[test]
    fn one_shot_fires_once_at_due_tick() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler.add_alarm(&recorder, Duration::from_ticks(3)).unwrap();
        advance(&clock, &scheduler, 2);
        assert_eq!(recorder.count(), 0);
        advance(&clock, &scheduler, 1);
        assert_eq!(recorder.count(), 1);
        advance(&clock, &scheduler, 10);
        assert_eq!(recorder.count(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn zero_delay_fires_on_next_pass() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler.add_alarm(&recorder, Duration::ZERO).unwrap();
        assert_eq!(scheduler.handle_events(), 1);
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler.add_alarm(&recorder, Duration::from_ticks(5)).unwrap();
        assert!(scheduler.is_armed(&recorder));
        assert!(scheduler.remove_alarm(&recorder));
        assert!(!scheduler.remove_alarm(&recorder));
        assert!(!scheduler.is_armed(&recorder));
        advance(&clock, &scheduler, 10);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn remove_takes_first_match_only() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler.add_alarm(&recorder, Duration::from_ticks(2)).unwrap();
        scheduler.add_alarm(&recorder, Duration::from_ticks(4)).unwrap();
        assert!(scheduler.remove_alarm(&recorder));
        assert_eq!(scheduler.pending(), 1);
        advance(&clock, &scheduler, 5);
        assert_eq!(*recorder.fired.lock().unwrap(), vec![Timestamp::from_ticks(4)]);
    }

    #[test]
    fn overdue_repeating_alarm_catches_up_one_per_pass() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler
            .add_repeating_alarm(&recorder, Duration::from_ticks(2), Duration::from_ticks(2))
            .unwrap();
        for _ in 0..7 {
            clock.tick();
        }
        assert_eq!(scheduler.handle_events(), 1);
        assert_eq!(scheduler.handle_events(), 1);
        assert_eq!(scheduler.handle_events(), 1);
        assert_eq!(scheduler.handle_events(), 0);
        assert_eq!(
            *recorder.fired.lock().unwrap(),
            vec![
                Timestamp::from_ticks(2),
                Timestamp::from_ticks(4),
                Timestamp::from_ticks(6)
            ]
        );
    }

    #[test]
    fn clear_disarms_everything() {
        let recorder = Recorder::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

        scheduler.add_alarm(&recorder, Duration::from_ticks(1)).unwrap();
        scheduler.add_alarm(&recorder, Duration::from_ticks(1)).unwrap();
        scheduler.clear();
        assert_eq!(scheduler.pending(), 0);
        advance(&clock, &scheduler, 3);
        assert_eq!(recorder.count(), 0);
    }
}
