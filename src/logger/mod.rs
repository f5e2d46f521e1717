//! `log` backend writing formatted lines to a text sink
//!
//! Lines look like `[1234] INFO atmega_runtime::os: message`, the bracketed
//! tick count only present when a clock is attached. The sink is borrowed
//! inside a critical section, so a line is never interleaved with another.

use core::cell::RefCell;
use core::fmt::{self, Write};
use critical_section::Mutex;
use log::{LevelFilter, Log, Metadata, Record};

use crate::rtos::Clock;

pub struct Logger<'a, W> {
    sink: Mutex<RefCell<W>>,
    level: LevelFilter,
    clock: Option<&'a Clock>,
}

impl<'a, W: Write + Send> Logger<'a, W> {
    pub const fn new(sink: W, level: LevelFilter) -> Self {
        Self {
            sink: Mutex::new(RefCell::new(sink)),
            level,
            clock: None,
        }
    }

    /// Prefix each line with the clock's tick count.
    pub const fn with_clock(mut self, clock: &'a Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Run `f` with exclusive access to the sink.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        critical_section::with(|cs| f(&mut self.sink.borrow_ref_mut(cs)))
    }

    fn write_record(&self, sink: &mut W, record: &Record) -> fmt::Result {
        if let Some(clock) = self.clock {
            write!(sink, "[{}] ", clock.current().ticks())?;
        }
        write!(
            sink,
            "{} {}: {}\r\n",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl<W: Write + Send> Log for Logger<'_, W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.with_sink(|sink| {
            // a sink that fails has nowhere to report it
            let _ = self.write_record(sink, record);
        });
    }

    fn flush(&self) {}
}

/// Install `logger` as the global logger.
#[cfg(not(target_arch = "avr"))]
pub fn init<W: Write + Send>(logger: &'static Logger<'static, W>) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level());
    Ok(())
}

/// Install `logger` as the global logger on a target without atomic
/// compare-and-swap.
///
/// # Safety
///
/// Must run once, before interrupts are enabled and before anything logs.
#[cfg(target_arch = "avr")]
pub unsafe fn init<W: Write + Send>(logger: &'static Logger<'static, W>) -> Result<(), log::SetLoggerError> {
    log::set_logger_racy(logger)?;
    log::set_max_level_racy(logger.level());
    Ok(())
}
