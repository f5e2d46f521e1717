//! Runtime context shared by the main loop and the tick interrupt

use crate::config::{ALARM_CAPACITY, RUNTIME_HANDLERS};
use crate::hal::TickSource;
use crate::rtos::{Clock, Scheduler};
use crate::Error;

/// A component with deferred work for the main loop.
pub trait EventHandler {
    fn handle_events(&self);
}

/// Explicitly constructed runtime: the clock and scheduler plus every
/// component that needs a main-loop poll step.
pub struct Runtime<'a, const ALARMS: usize = ALARM_CAPACITY, const HANDLERS: usize = RUNTIME_HANDLERS>
{
    scheduler: &'a Scheduler<'a, ALARMS>,
    handlers: [Option<&'a dyn EventHandler>; HANDLERS],
}

impl<'a, const ALARMS: usize, const HANDLERS: usize> Runtime<'a, ALARMS, HANDLERS> {
    pub const fn new(scheduler: &'a Scheduler<'a, ALARMS>) -> Self {
        Self {
            scheduler,
            handlers: [None; HANDLERS],
        }
    }

    pub fn clock(&self) -> &'a Clock {
        self.scheduler.clock()
    }

    pub fn scheduler(&self) -> &'a Scheduler<'a, ALARMS> {
        self.scheduler
    }

    /// Add a handler to the poll step. Handlers run in registration order
    /// after the scheduler.
    pub fn register(&mut self, handler: &'a dyn EventHandler) -> Result<(), Error> {
        match self.handlers.iter_mut().find(|h| h.is_none()) {
            Some(slot) => {
                *slot = Some(handler);
                Ok(())
            }
            None => {
                log::warn!("runtime handler table full ({} slots)", HANDLERS);
                Err(Error::CapacityExceeded)
            }
        }
    }

    /// Tick interrupt entry point.
    #[inline]
    pub fn tick(&self) {
        self.scheduler.clock().tick();
    }

    /// One main-loop step: fire due alarms, then let every handler deliver
    /// its deferred notifications.
    pub fn poll(&self) {
        self.scheduler.handle_events();
        for handler in self.handlers.iter().flatten() {
            handler.handle_events();
        }
    }

    /// Program `timer` for the clock's tick rate and start it.
    pub fn start<T: TickSource>(&self, timer: &mut T) -> Result<(), Error> {
        let rate = self.clock().rate();
        timer.set_rate(rate)?;
        timer.start();
        log::info!("tick source started at {} Hz", rate.ticks_per_second());
        Ok(())
    }

    /// Poll forever, calling `idle` between passes.
    pub fn run<F: FnMut()>(&self, mut idle: F) -> ! {
        loop {
            self.poll();
            idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimTimer;
    use crate::rtos::{Alarm, AlarmListener, Duration, TickRate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl EventHandler for Counter {
        fn handle_events(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl AlarmListener for Counter {
        fn alarm(&self, _alarm: &Alarm) {
            self.0.fetch_add(100, Ordering::SeqCst);
        }
    }

    #[test]
    fn poll_runs_scheduler_then_handlers() {
        let first = Counter::default();
        let second = Counter::default();
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let mut runtime: Runtime<'_, 2, 2> = Runtime::new(&scheduler);

        runtime.register(&first).unwrap();
        runtime.register(&second).unwrap();
        assert_eq!(runtime.register(&first), Err(Error::CapacityExceeded));

        scheduler.add_alarm(&first, Duration::from_ticks(1)).unwrap();
        runtime.poll();
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        runtime.tick();
        runtime.poll();
        assert_eq!(first.0.load(Ordering::SeqCst), 102);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_programs_tick_source() {
        let clock = Clock::new(TickRate::new(1000));
        let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
        let runtime: Runtime<'_, 2, 2> = Runtime::new(&scheduler);
        let mut timer = SimTimer::new(16_000_000);

        runtime.start(&mut timer).unwrap();
        assert!(timer.is_running());
        assert_eq!(timer.config().map(|c| c.top), Some(249));
    }
}
