//! Host-side stand-ins for the pin, EEPROM and timer hardware.
//!
//! Nothing here raises interrupts by itself. The caller plays the interrupt
//! controller: when a method reports that an interrupt would fire, the test
//! invokes the matching handler entry point.

use core::cell::{Cell, RefCell};
use critical_section::Mutex;

use super::eeprom::EepromDevice;
use super::gpio::{ChangeInterrupts, PinId, PinIo, PinRead};
use super::timer::{TickSource, TimerConfig};
use crate::rtos::TickRate;
use crate::Error;

/// Up to 32 simulated pins.
pub struct SimPins<const N: usize> {
    levels: Mutex<Cell<u32>>,
    outputs: Mutex<Cell<u32>>,
    enabled: Mutex<Cell<u32>>,
    reads: Mutex<Cell<u32>>,
}

impl<const N: usize> SimPins<N> {
    pub const fn new() -> Self {
        assert!(N <= 32);
        Self {
            levels: Mutex::new(Cell::new(0)),
            outputs: Mutex::new(Cell::new(0)),
            enabled: Mutex::new(Cell::new(0)),
            reads: Mutex::new(Cell::new(0)),
        }
    }

    /// Drive the physical level of a pin.
    ///
    /// Returns `true` when the level changed while the pin's change
    /// interrupt was enabled, i.e. when the pin-change handler should run.
    pub fn set_level(&self, pin: PinId, high: bool) -> bool {
        if pin as usize >= N {
            return false;
        }
        critical_section::with(|cs| {
            let levels = self.levels.borrow(cs);
            let old = levels.get();
            let new = if high { old | (1 << pin) } else { old & !(1 << pin) };
            levels.set(new);
            old != new && self.enabled.borrow(cs).get() & (1 << pin) != 0
        })
    }

    pub fn level(&self, pin: PinId) -> bool {
        pin < 32 && critical_section::with(|cs| self.levels.borrow(cs).get() & (1 << pin) != 0)
    }

    pub fn is_output(&self, pin: PinId) -> bool {
        pin < 32 && critical_section::with(|cs| self.outputs.borrow(cs).get() & (1 << pin) != 0)
    }

    /// Number of `pin_read` calls so far.
    pub fn reads(&self) -> u32 {
        critical_section::with(|cs| self.reads.borrow(cs).get())
    }

    fn update(cell: &Mutex<Cell<u32>>, pin: PinId, set: bool) {
        critical_section::with(|cs| {
            let cell = cell.borrow(cs);
            let bits = cell.get();
            cell.set(if set { bits | (1 << pin) } else { bits & !(1 << pin) });
        });
    }
}

impl<const N: usize> Default for SimPins<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PinRead for SimPins<N> {
    fn pin_count(&self) -> usize {
        N
    }

    fn pin_read(&self, pin: PinId) -> bool {
        critical_section::with(|cs| {
            let reads = self.reads.borrow(cs);
            reads.set(reads.get() + 1);
        });
        self.is_valid(pin) && self.level(pin)
    }
}

impl<const N: usize> PinIo for SimPins<N> {
    fn set_input(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.outputs, pin, false);
        }
    }

    fn set_output(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.outputs, pin, true);
        }
    }

    fn pin_on(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.levels, pin, true);
        }
    }

    fn pin_off(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.levels, pin, false);
        }
    }
}

impl<const N: usize> ChangeInterrupts for SimPins<N> {
    fn enable_change_interrupt(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.enabled, pin, true);
        }
    }

    fn disable_change_interrupt(&self, pin: PinId) {
        if self.is_valid(pin) {
            Self::update(&self.enabled, pin, false);
        }
    }

    fn is_change_interrupt_enabled(&self, pin: PinId) -> bool {
        self.is_valid(pin)
            && critical_section::with(|cs| self.enabled.borrow(cs).get() & (1 << pin) != 0)
    }
}

/// Simulated EEPROM of `N` bytes, erased to `0xFF`.
///
/// An interrupt-driven byte write stays pending until [`complete`] commits
/// it, so a test can observe the pipeline mid-write.
///
/// [`complete`]: SimEeprom::complete
pub struct SimEeprom<const N: usize> {
    memory: Mutex<RefCell<[u8; N]>>,
    pending: Mutex<Cell<Option<(u16, u8)>>>,
    interrupt_enabled: Mutex<Cell<bool>>,
    interrupt_writes: Mutex<Cell<u32>>,
}

impl<const N: usize> SimEeprom<N> {
    pub const fn new() -> Self {
        assert!(N <= u16::MAX as usize);
        Self {
            memory: Mutex::new(RefCell::new([0xFF; N])),
            pending: Mutex::new(Cell::new(None)),
            interrupt_enabled: Mutex::new(Cell::new(false)),
            interrupt_writes: Mutex::new(Cell::new(0)),
        }
    }

    /// Fill memory directly, bypassing the write path.
    pub fn load(&self, address: u16, data: &[u8]) {
        critical_section::with(|cs| {
            let mut memory = self.memory.borrow_ref_mut(cs);
            let start = address as usize;
            memory[start..start + data.len()].copy_from_slice(data);
        });
    }

    pub fn byte(&self, address: u16) -> u8 {
        critical_section::with(|cs| self.memory.borrow_ref(cs)[address as usize])
    }

    pub fn copy_to(&self, address: u16, buffer: &mut [u8]) {
        critical_section::with(|cs| {
            let memory = self.memory.borrow_ref(cs);
            let start = address as usize;
            buffer.copy_from_slice(&memory[start..start + buffer.len()]);
        });
    }

    /// Commit the pending byte, if any.
    ///
    /// Returns `true` when the ready interrupt is enabled, i.e. when the
    /// write-complete handler should run.
    pub fn complete(&self) -> bool {
        critical_section::with(|cs| {
            if let Some((address, value)) = self.pending.borrow(cs).take() {
                self.memory.borrow_ref_mut(cs)[address as usize] = value;
            }
            self.interrupt_enabled.borrow(cs).get()
        })
    }

    pub fn is_ready_interrupt_enabled(&self) -> bool {
        critical_section::with(|cs| self.interrupt_enabled.borrow(cs).get())
    }

    /// Byte writes started through the interrupt-driven path.
    pub fn interrupt_writes(&self) -> u32 {
        critical_section::with(|cs| self.interrupt_writes.borrow(cs).get())
    }
}

impl<const N: usize> Default for SimEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EepromDevice for SimEeprom<N> {
    fn capacity(&self) -> u16 {
        N as u16
    }

    fn is_write_busy(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get().is_some())
    }

    fn read_byte(&self, address: u16) -> u8 {
        self.byte(address)
    }

    fn write_byte(&self, address: u16, value: u8) {
        self.complete();
        critical_section::with(|cs| {
            self.memory.borrow_ref_mut(cs)[address as usize] = value;
        });
    }

    fn start_byte_write(&self, address: u16, value: u8) {
        self.complete();
        critical_section::with(|cs| {
            self.pending.borrow(cs).set(Some((address, value)));
            self.interrupt_enabled.borrow(cs).set(true);
            let writes = self.interrupt_writes.borrow(cs);
            writes.set(writes.get() + 1);
        });
    }

    fn disable_ready_interrupt(&self) {
        critical_section::with(|cs| self.interrupt_enabled.borrow(cs).set(false));
    }
}

/// Tick source that only records how it was programmed.
pub struct SimTimer {
    cpu_hz: u32,
    config: Option<TimerConfig>,
    running: bool,
}

impl SimTimer {
    pub fn new(cpu_hz: u32) -> Self {
        Self {
            cpu_hz,
            config: None,
            running: false,
        }
    }

    pub fn config(&self) -> Option<TimerConfig> {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl TickSource for SimTimer {
    fn set_rate(&mut self, rate: TickRate) -> Result<(), Error> {
        self.config = Some(TimerConfig::for_rate(self.cpu_hz, rate)?);
        Ok(())
    }

    fn start(&mut self) {
        self.running = self.config.is_some();
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
