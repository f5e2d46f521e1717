//! Configuration constants for the ATmega128 runtime

use crate::rtos::{Duration, TickRate};
use log::LevelFilter;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// Tick interrupt frequency. One tick per millisecond.
pub const TICK_HZ: u16 = 1000;

pub const TICK_RATE: TickRate = TickRate::new(TICK_HZ);

/// Alarm table slots in the scheduler
pub const ALARM_CAPACITY: usize = 8;

/// Pins that may be debouncing at the same time
pub const DEBOUNCE_SLOTS: usize = 20;

/// A pin must hold its level this long before it is reported stable
pub const DEBOUNCE_SETTLE_MS: u32 = 20;

/// Period of the shared re-check alarm while any pin is debouncing
pub const DEBOUNCE_RECHECK_MS: u32 = 5;

pub const DEBOUNCE_SETTLE: Duration = TICK_RATE.millis(DEBOUNCE_SETTLE_MS);
pub const DEBOUNCE_RECHECK: Duration = TICK_RATE.millis(DEBOUNCE_RECHECK_MS);

/// Shortest press reported as a single press
pub const BUTTON_MIN_PRESS_MS: u32 = 16;

/// A button down this long is reported as held
pub const BUTTON_HOLD_MS: u32 = 500;

/// Held reports repeat at this period while the button stays down
pub const BUTTON_REPEAT_MS: u32 = 100;

/// Period of the alarm that looks for held buttons
pub const BUTTON_POLL_MS: u32 = 10;

pub const BUTTON_MIN_PRESS: Duration = TICK_RATE.millis(BUTTON_MIN_PRESS_MS);
pub const BUTTON_HOLD: Duration = TICK_RATE.millis(BUTTON_HOLD_MS);
pub const BUTTON_REPEAT: Duration = TICK_RATE.millis(BUTTON_REPEAT_MS);
pub const BUTTON_POLL: Duration = TICK_RATE.millis(BUTTON_POLL_MS);

/// Highest pin id + 1 accepted by the pin layer
pub const MAX_PINS: usize = 24;

/// On-chip EEPROM size in bytes
pub const EEPROM_SIZE: u16 = 4096;

/// Main-loop handlers a runtime can poll besides the scheduler
pub const RUNTIME_HANDLERS: usize = 4;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

#[cfg(feature = "debug")]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Debug;
#[cfg(not(feature = "debug"))]
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;
