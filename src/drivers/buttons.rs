//! Press and hold detection for push buttons
//!
//! [`Buttons`] listens to a [`Debouncer`](super::Debouncer). Buttons pull
//! their line low, so a stable low level is a press and a stable high level
//! a release. A release after at least the minimum press time is a single
//! press, unless the button was already reported held. A button that stays
//! down is reported held after the hold time and then once per repeat
//! period. Holds are found by a repeating alarm (see [`Buttons::start`]) or
//! by calling [`Buttons::check_held`] from the main loop.

use core::cell::RefCell;
use critical_section::Mutex;

use super::debounce::DebounceListener;
use crate::config::{
    ALARM_CAPACITY, BUTTON_HOLD, BUTTON_MIN_PRESS, BUTTON_POLL, BUTTON_REPEAT, MAX_PINS,
};
use crate::hal::gpio::PinId;
use crate::rtos::{Alarm, AlarmListener, Duration, Scheduler, Timestamp};
use crate::Error;

/// Button gestures, delivered from the main loop.
pub trait ButtonListener: Sync {
    /// Released after being down for `held_for`.
    fn single_press(&self, pin: PinId, held_for: Duration);

    /// Still down. The first report counts from the press, later ones from
    /// the previous report.
    fn held_down(&self, _pin: PinId, _held_for: Duration) {}
}

#[derive(Clone, Copy)]
struct Button<'a> {
    listener: &'a dyn ButtonListener,
    down_since: Option<Timestamp>,
    held: bool,
}

pub struct Buttons<'a, const ALARMS: usize = ALARM_CAPACITY> {
    scheduler: &'a Scheduler<'a, ALARMS>,
    min_press: Duration,
    hold: Duration,
    repeat: Duration,
    poll: Duration,
    buttons: Mutex<RefCell<[Option<Button<'a>>; MAX_PINS]>>,
}

impl<'a, const ALARMS: usize> Buttons<'a, ALARMS> {
    pub const fn new(scheduler: &'a Scheduler<'a, ALARMS>) -> Self {
        Self {
            scheduler,
            min_press: BUTTON_MIN_PRESS,
            hold: BUTTON_HOLD,
            repeat: BUTTON_REPEAT,
            poll: BUTTON_POLL,
            buttons: Mutex::new(RefCell::new([None; MAX_PINS])),
        }
    }

    /// Override the minimum press, hold and repeat times.
    pub const fn with_timing(mut self, min_press: Duration, hold: Duration, repeat: Duration) -> Self {
        self.min_press = min_press;
        self.hold = hold;
        self.repeat = repeat;
        self
    }

    /// Override the period of the hold alarm.
    pub const fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Track `pin`. `level` is the line as it reads now; a button that is
    /// already down is timed from here.
    pub fn assign(&self, pin: PinId, listener: &'a dyn ButtonListener, level: bool) -> Result<(), Error> {
        if pin as usize >= MAX_PINS {
            return Err(Error::InvalidPin);
        }
        let down_since = if level { None } else { Some(self.scheduler.now()) };
        critical_section::with(|cs| {
            self.buttons.borrow_ref_mut(cs)[pin as usize] = Some(Button {
                listener,
                down_since,
                held: false,
            });
        });
        Ok(())
    }

    pub fn deassign(&self, pin: PinId) -> Result<(), Error> {
        if pin as usize >= MAX_PINS {
            return Err(Error::InvalidPin);
        }
        critical_section::with(|cs| self.buttons.borrow_ref_mut(cs)[pin as usize] = None);
        Ok(())
    }

    pub fn is_down(&self, pin: PinId) -> bool {
        critical_section::with(|cs| {
            self.buttons
                .borrow_ref(cs)
                .get(pin as usize)
                .copied()
                .flatten()
                .map_or(false, |b| b.down_since.is_some())
        })
    }

    /// Arm the repeating alarm that runs [`Buttons::check_held`].
    pub fn start(&'a self) -> Result<(), Error> {
        if self.scheduler.is_armed(self) {
            return Ok(());
        }
        self.scheduler.add_repeating_alarm(self, self.poll, self.poll)
    }

    pub fn stop(&self) -> bool {
        self.scheduler.remove_alarm(self)
    }

    /// Report every button that has been down for the hold time, or for the
    /// repeat time since its last report.
    pub fn check_held(&self) {
        let now = self.scheduler.now();
        for pin in 0..MAX_PINS {
            let due = critical_section::with(|cs| {
                let mut buttons = self.buttons.borrow_ref_mut(cs);
                let button = buttons[pin].as_mut()?;
                let held_for = now.since(button.down_since?);
                let limit = if button.held { self.repeat } else { self.hold };
                if held_for < limit {
                    return None;
                }
                button.held = true;
                button.down_since = Some(now);
                Some((button.listener, held_for))
            });

            if let Some((listener, held_for)) = due {
                log::trace!("button {} held", pin);
                listener.held_down(pin as PinId, held_for);
            }
        }
    }
}

impl<'a, const ALARMS: usize> DebounceListener for Buttons<'a, ALARMS> {
    fn pin_changed(&self, pin: PinId, level: bool) {
        let now = self.scheduler.now();
        let press = critical_section::with(|cs| {
            let mut buttons = self.buttons.borrow_ref_mut(cs);
            let button = buttons.get_mut(pin as usize)?.as_mut()?;
            if !level {
                // a repeated low keeps the original press time
                button.down_since.get_or_insert(now);
                return None;
            }

            let held_for = now.since(button.down_since.take()?);
            let was_held = core::mem::replace(&mut button.held, false);
            if was_held || held_for < self.min_press {
                return None;
            }
            Some((button.listener, held_for))
        });

        if let Some((listener, held_for)) = press {
            log::debug!("button {} pressed", pin);
            listener.single_press(pin, held_for);
        }
    }
}

impl<'a, const ALARMS: usize> AlarmListener for Buttons<'a, ALARMS> {
    fn alarm(&self, _alarm: &Alarm) {
        self.check_held();
    }
}
