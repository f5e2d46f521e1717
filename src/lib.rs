//! Interrupt/main-loop runtime for the ATmega128.
//!
//! A single cooperative main loop shares a handful of tables with the
//! interrupt handlers that preempt it:
//!
//! - [`rtos::Lock`] guards state touched from both contexts.
//! - [`rtos::Clock`] is advanced by the periodic tick interrupt.
//! - [`rtos::Scheduler`] fires alarms from the main loop, never from the tick.
//! - [`drivers::Debouncer`] turns noisy pin-change interrupts into clean events.
//! - [`drivers::Buttons`] turns those events into presses and holds.
//! - [`drivers::Eeprom`] streams writes byte by byte from the EEPROM ready
//!   interrupt.
//!
//! Hardware is reached through the traits in [`hal`]; the ATmega128 register
//! implementations are only compiled for AVR targets and [`hal::sim`] stands
//! in for them on the host.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod logger;
pub mod os;
pub mod rtos;

pub use error::Error;
pub use os::{EventHandler, Runtime};
pub use rtos::{
    Alarm, AlarmListener, Clock, Duration, Lock, LockGuard, Scheduler, TickRate, Timestamp,
};
