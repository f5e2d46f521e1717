//! Pin debouncing on top of the alarm scheduler
//!
//! A pin-change interrupt masks further changes on that pin, samples its
//! level and parks it in a slot. One shared repeating alarm re-samples every
//! parked pin once its settle window has passed. A pin that still shows the
//! sampled level is confirmed: its listener is told and the interrupt is
//! unmasked. A pin that moved again restarts its window.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::config::{ALARM_CAPACITY, DEBOUNCE_RECHECK, DEBOUNCE_SETTLE, DEBOUNCE_SLOTS, MAX_PINS};
use crate::hal::gpio::{ChangeInterrupts, PinId, PinRead};
use crate::rtos::{Alarm, AlarmListener, Duration, Scheduler, Timestamp};
use crate::Error;

/// Receives debounced pin events. Called from the main loop.
pub trait DebounceListener: Sync {
    /// The pin held `level` for a full settle window.
    fn pin_changed(&self, pin: PinId, level: bool);

    /// The pin moved during its settle window and the window restarted.
    fn bouncing(&self, _pin: PinId, _level: bool) {}
}

#[derive(Clone, Copy)]
struct Slot {
    pin: PinId,
    level: bool,
    rearm_at: Timestamp,
}

struct Table<const SLOTS: usize> {
    slots: [Option<Slot>; SLOTS],
    recheck_armed: bool,
}

enum Event {
    Stable(PinId, bool),
    Bouncing(PinId, bool),
}

pub struct Debouncer<
    'a,
    P,
    const SLOTS: usize = DEBOUNCE_SLOTS,
    const ALARMS: usize = ALARM_CAPACITY,
> {
    scheduler: &'a Scheduler<'a, ALARMS>,
    pins: &'a P,
    settle: Duration,
    recheck: Duration,
    listeners: Mutex<RefCell<[Option<&'a dyn DebounceListener>; MAX_PINS]>>,
    table: Mutex<RefCell<Table<SLOTS>>>,
}

impl<'a, P, const SLOTS: usize, const ALARMS: usize> Debouncer<'a, P, SLOTS, ALARMS>
where
    P: PinRead + ChangeInterrupts + Sync,
{
    pub const fn new(scheduler: &'a Scheduler<'a, ALARMS>, pins: &'a P) -> Self {
        Self {
            scheduler,
            pins,
            settle: DEBOUNCE_SETTLE,
            recheck: DEBOUNCE_RECHECK,
            listeners: Mutex::new(RefCell::new([None; MAX_PINS])),
            table: Mutex::new(RefCell::new(Table {
                slots: [None; SLOTS],
                recheck_armed: false,
            })),
        }
    }

    /// Override the settle window and the re-check period.
    pub const fn with_timing(mut self, settle: Duration, recheck: Duration) -> Self {
        self.settle = settle;
        self.recheck = recheck;
        self
    }

    fn check_pin(&self, pin: PinId) -> Result<(), Error> {
        if (pin as usize) < MAX_PINS && self.pins.is_valid(pin) {
            Ok(())
        } else {
            Err(Error::InvalidPin)
        }
    }

    /// Route debounced events for `pin` to `listener` and unmask its change
    /// interrupt. Replaces any previous listener for the pin.
    pub fn assign(&self, pin: PinId, listener: &'a dyn DebounceListener) -> Result<(), Error> {
        self.check_pin(pin)?;
        critical_section::with(|cs| {
            self.listeners.borrow_ref_mut(cs)[pin as usize] = Some(listener);
            self.pins.enable_change_interrupt(pin);
        });
        log::debug!("pin {} assigned", pin);
        Ok(())
    }

    /// Mask the pin, forget its listener and drop any debounce in flight.
    pub fn deassign(&self, pin: PinId) -> Result<(), Error> {
        self.check_pin(pin)?;
        critical_section::with(|cs| {
            self.pins.disable_change_interrupt(pin);
            self.listeners.borrow_ref_mut(cs)[pin as usize] = None;
            let mut table = self.table.borrow_ref_mut(cs);
            for slot in table.slots.iter_mut() {
                if slot.map_or(false, |s| s.pin == pin) {
                    *slot = None;
                }
            }
        });
        log::debug!("pin {} deassigned", pin);
        Ok(())
    }

    pub fn is_debouncing(&self, pin: PinId) -> bool {
        critical_section::with(|cs| {
            self.table
                .borrow_ref(cs)
                .slots
                .iter()
                .flatten()
                .any(|s| s.pin == pin)
        })
    }

    /// Pins currently inside a settle window.
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.table.borrow_ref(cs).slots.iter().flatten().count())
    }

    /// Pin-change interrupt entry point.
    ///
    /// A change on a pin that is already debouncing is ignored. Otherwise
    /// the pin is masked, sampled and parked, and the shared re-check alarm
    /// is armed if it is not already. Fails with
    /// [`Error::CapacityExceeded`] when no slot or alarm is free; the pin is
    /// left unmasked in that case so a later change can retry.
    pub fn pin_change(&'a self, pin: PinId) -> Result<(), Error> {
        self.check_pin(pin)?;
        let now = self.scheduler.now();

        let arm_recheck = critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            if table.slots.iter().flatten().any(|s| s.pin == pin) {
                return Ok(false);
            }

            self.pins.disable_change_interrupt(pin);
            let level = self.pins.pin_read(pin);
            match table.slots.iter_mut().find(|s| s.is_none()) {
                Some(free) => {
                    *free = Some(Slot {
                        pin,
                        level,
                        rearm_at: now.increment(self.settle),
                    });
                }
                None => {
                    self.pins.enable_change_interrupt(pin);
                    return Err(Error::CapacityExceeded);
                }
            }

            let arm = !table.recheck_armed;
            table.recheck_armed = true;
            Ok(arm)
        })?;

        if arm_recheck {
            let when = now.increment(self.recheck);
            if let Err(err) = self.scheduler.arm(self, when, self.recheck) {
                critical_section::with(|cs| {
                    let mut table = self.table.borrow_ref_mut(cs);
                    table.recheck_armed = false;
                    for slot in table.slots.iter_mut() {
                        if slot.map_or(false, |s| s.pin == pin) {
                            *slot = None;
                        }
                    }
                    self.pins.enable_change_interrupt(pin);
                });
                return Err(err);
            }
        }
        Ok(())
    }

    fn listener(&self, pin: PinId) -> Option<&'a dyn DebounceListener> {
        critical_section::with(|cs| {
            self.listeners
                .borrow_ref(cs)
                .get(pin as usize)
                .copied()
                .flatten()
        })
    }

    /// Re-sample one slot if its window has passed.
    fn recheck_slot(&self, index: usize, now: Timestamp) -> Option<Event> {
        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let slot = table.slots[index].as_mut()?;
            if !now.is_at_or_after(slot.rearm_at) {
                return None;
            }

            let level = self.pins.pin_read(slot.pin);
            if level == slot.level {
                let pin = slot.pin;
                table.slots[index] = None;
                self.pins.enable_change_interrupt(pin);
                Some(Event::Stable(pin, level))
            } else {
                slot.level = level;
                slot.rearm_at = now.increment(self.settle);
                Some(Event::Bouncing(slot.pin, level))
            }
        })
    }
}

impl<'a, P, const SLOTS: usize, const ALARMS: usize> AlarmListener
    for Debouncer<'a, P, SLOTS, ALARMS>
where
    P: PinRead + ChangeInterrupts + Sync,
{
    fn alarm(&self, _alarm: &Alarm) {
        let now = self.scheduler.now();

        for index in 0..SLOTS {
            match self.recheck_slot(index, now) {
                Some(Event::Stable(pin, level)) => {
                    log::debug!("pin {} settled {}", pin, level);
                    if let Some(listener) = self.listener(pin) {
                        listener.pin_changed(pin, level);
                    }
                }
                Some(Event::Bouncing(pin, level)) => {
                    log::trace!("pin {} bouncing {}", pin, level);
                    if let Some(listener) = self.listener(pin) {
                        listener.bouncing(pin, level);
                    }
                }
                None => {}
            }
        }

        // Checked and removed together so a concurrent pin change either
        // sees the alarm still armed or arms a new one.
        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            if table.recheck_armed && table.slots.iter().all(Option::is_none) {
                self.scheduler.disarm(self);
                table.recheck_armed = false;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimPins;
    use crate::rtos::{Clock, TickRate};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Events {
        stable: StdMutex<Vec<(PinId, bool)>>,
        bounces: StdMutex<Vec<(PinId, bool)>>,
    }

    impl DebounceListener for Events {
        fn pin_changed(&self, pin: PinId, level: bool) {
            self.stable.lock().unwrap().push((pin, level));
        }

        fn bouncing(&self, pin: PinId, level: bool) {
            self.bounces.lock().unwrap().push((pin, level));
        }
    }

    #[test]
    fn invalid_pins_are_rejected() {
        let events = Events::default();
        let pins = SimPins::<4>::new();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let debouncer: Debouncer<'_, _, 2, 2> = Debouncer::new(&scheduler, &pins);

        assert_eq!(debouncer.assign(4, &events), Err(Error::InvalidPin));
        assert_eq!(debouncer.deassign(9), Err(Error::InvalidPin));
        assert_eq!(debouncer.pin_change(4), Err(Error::InvalidPin));
    }

    #[test]
    fn repeated_interrupts_share_one_slot_and_one_alarm() {
        let events = Events::default();
        let pins = SimPins::<4>::new();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let debouncer: Debouncer<'_, _, 2, 2> = Debouncer::new(&scheduler, &pins);

        debouncer.assign(0, &events).unwrap();
        debouncer.assign(1, &events).unwrap();
        pins.set_level(0, true);
        debouncer.pin_change(0).unwrap();
        debouncer.pin_change(0).unwrap();
        pins.set_level(1, true);
        debouncer.pin_change(1).unwrap();

        assert_eq!(debouncer.pending(), 2);
        assert_eq!(scheduler.pending(), 1);
        assert!(!pins.is_change_interrupt_enabled(0));
        assert!(!pins.is_change_interrupt_enabled(1));
    }

    #[test]
    fn slot_table_full_leaves_pin_unmasked() {
        let events = Events::default();
        let pins = SimPins::<4>::new();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let debouncer: Debouncer<'_, _, 1, 2> = Debouncer::new(&scheduler, &pins);

        debouncer.assign(0, &events).unwrap();
        debouncer.assign(1, &events).unwrap();
        debouncer.pin_change(0).unwrap();
        assert_eq!(debouncer.pin_change(1), Err(Error::CapacityExceeded));
        assert!(pins.is_change_interrupt_enabled(1));
        assert!(!debouncer.is_debouncing(1));
    }

    #[test]
    fn no_free_alarm_rolls_back_the_slot() {
        struct Idle;
        impl AlarmListener for Idle {
            fn alarm(&self, _alarm: &Alarm) {}
        }

        let idle = Idle;
        let events = Events::default();
        let pins = SimPins::<4>::new();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 1> = Scheduler::new(&clock);
        let debouncer: Debouncer<'_, _, 2, 1> = Debouncer::new(&scheduler, &pins);

        scheduler.add_alarm(&idle, Duration::from_ticks(100)).unwrap();
        debouncer.assign(2, &events).unwrap();
        assert_eq!(debouncer.pin_change(2), Err(Error::CapacityExceeded));
        assert_eq!(debouncer.pending(), 0);
        assert!(pins.is_change_interrupt_enabled(2));

        // once the table has room the next change goes through
        scheduler.clear();
        debouncer.pin_change(2).unwrap();
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn deassign_drops_the_pending_slot() {
        let events = Events::default();
        let pins = SimPins::<4>::new();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let debouncer: Debouncer<'_, _, 2, 2> = Debouncer::new(&scheduler, &pins)
            .with_timing(Duration::from_ticks(4), Duration::from_ticks(2));

        debouncer.assign(3, &events).unwrap();
        pins.set_level(3, true);
        debouncer.pin_change(3).unwrap();
        debouncer.deassign(3).unwrap();
        assert!(!pins.is_change_interrupt_enabled(3));

        for _ in 0..10 {
            clock.tick();
            scheduler.handle_events();
        }
        assert!(events.stable.lock().unwrap().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }
}
