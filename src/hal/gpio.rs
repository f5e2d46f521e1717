//! Logical pin layer
//!
//! Pins are addressed by a small integer id. The debouncer only needs
//! [`PinRead`] and [`ChangeInterrupts`]; [`PinIo`] covers the rest of the
//! raw pin operations for application code.

use core::cell::Cell;
use critical_section::Mutex;
use embedded_hal::digital::v2::InputPin;

pub type PinId = u8;

pub trait PinRead {
    /// Number of valid pin ids, `0..pin_count()`.
    fn pin_count(&self) -> usize;

    /// Current physical level, `true` for high.
    fn pin_read(&self, pin: PinId) -> bool;

    fn is_valid(&self, pin: PinId) -> bool {
        (pin as usize) < self.pin_count()
    }
}

pub trait PinIo: PinRead {
    fn set_input(&self, pin: PinId);
    fn set_output(&self, pin: PinId);
    fn pin_on(&self, pin: PinId);
    fn pin_off(&self, pin: PinId);
}

/// Per-pin enable for the change interrupt.
///
/// Both calls are made from interrupt and main-loop context and must be
/// safe to call with interrupts disabled.
pub trait ChangeInterrupts {
    fn enable_change_interrupt(&self, pin: PinId);
    fn disable_change_interrupt(&self, pin: PinId);
    fn is_change_interrupt_enabled(&self, pin: PinId) -> bool;
}

/// Adapts a set of `embedded-hal` input pins to the pin layer.
///
/// Suits pins that share one interrupt vector: the change interrupt mask is
/// kept in software and the vector handler asks
/// [`is_change_interrupt_enabled`](ChangeInterrupts::is_change_interrupt_enabled)
/// before forwarding a change. A pin that fails to read reports low.
pub struct InputPins<I, const N: usize> {
    pins: [I; N],
    mask: Mutex<Cell<u32>>,
}

impl<I: InputPin, const N: usize> InputPins<I, N> {
    pub fn new(pins: [I; N]) -> Self {
        assert!(N <= 32, "software mask holds 32 pins");
        Self {
            pins,
            mask: Mutex::new(Cell::new(0)),
        }
    }

    pub fn release(self) -> [I; N] {
        self.pins
    }
}

impl<I: InputPin, const N: usize> PinRead for InputPins<I, N> {
    fn pin_count(&self) -> usize {
        N
    }

    fn pin_read(&self, pin: PinId) -> bool {
        self.pins
            .get(pin as usize)
            .map_or(false, |p| p.is_high().unwrap_or(false))
    }
}

impl<I: InputPin, const N: usize> ChangeInterrupts for InputPins<I, N> {
    fn enable_change_interrupt(&self, pin: PinId) {
        if (pin as usize) < N {
            critical_section::with(|cs| {
                let mask = self.mask.borrow(cs);
                mask.set(mask.get() | (1 << pin));
            });
        }
    }

    fn disable_change_interrupt(&self, pin: PinId) {
        if (pin as usize) < N {
            critical_section::with(|cs| {
                let mask = self.mask.borrow(cs);
                mask.set(mask.get() & !(1 << pin));
            });
        }
    }

    fn is_change_interrupt_enabled(&self, pin: PinId) -> bool {
        (pin as usize) < N && critical_section::with(|cs| self.mask.borrow(cs).get() & (1 << pin) != 0)
    }
}

/// External interrupts INT4 - INT7 on PE4 - PE7.
///
/// Pin ids 0 - 3 map to INT4 - INT7. Each line is configured for any-edge
/// sensing and gets its own vector.
#[cfg(target_arch = "avr")]
pub struct ExtInt {
    _private: (),
}

#[cfg(target_arch = "avr")]
mod ext_int {
    use super::*;
    use avr_device::atmega128a::{EXINT, PORTE};

    const FIRST_BIT: u8 = 4;
    const LINES: usize = 4;

    #[inline]
    fn bit(pin: PinId) -> u8 {
        1 << (FIRST_BIT + pin)
    }

    impl ExtInt {
        pub const fn new() -> Self {
            Self { _private: () }
        }

        /// Make PE4 - PE7 inputs with pull-ups and select any-edge sensing.
        /// Interrupts start masked.
        pub fn init(&self) {
            unsafe {
                let port = &*PORTE::ptr();
                port.ddre.modify(|r, w| w.bits(r.bits() & 0x0F));
                port.porte.modify(|r, w| w.bits(r.bits() | 0xF0));

                let exint = &*EXINT::ptr();
                exint.eimsk.modify(|r, w| w.bits(r.bits() & 0x0F));
                // ISCn1:ISCn0 = 01, any logical change
                exint.eicrb.write(|w| w.bits(0b0101_0101));
                exint.eifr.write(|w| w.bits(0xF0));
            }
        }
    }

    impl PinRead for ExtInt {
        fn pin_count(&self) -> usize {
            LINES
        }

        fn pin_read(&self, pin: PinId) -> bool {
            if !self.is_valid(pin) {
                return false;
            }
            unsafe { (*PORTE::ptr()).pine.read().bits() & bit(pin) != 0 }
        }
    }

    impl PinIo for ExtInt {
        fn set_input(&self, pin: PinId) {
            if self.is_valid(pin) {
                unsafe { (*PORTE::ptr()).ddre.modify(|r, w| w.bits(r.bits() & !bit(pin))) }
            }
        }

        fn set_output(&self, pin: PinId) {
            if self.is_valid(pin) {
                unsafe { (*PORTE::ptr()).ddre.modify(|r, w| w.bits(r.bits() | bit(pin))) }
            }
        }

        fn pin_on(&self, pin: PinId) {
            if self.is_valid(pin) {
                unsafe { (*PORTE::ptr()).porte.modify(|r, w| w.bits(r.bits() | bit(pin))) }
            }
        }

        fn pin_off(&self, pin: PinId) {
            if self.is_valid(pin) {
                unsafe { (*PORTE::ptr()).porte.modify(|r, w| w.bits(r.bits() & !bit(pin))) }
            }
        }
    }

    impl ChangeInterrupts for ExtInt {
        fn enable_change_interrupt(&self, pin: PinId) {
            if self.is_valid(pin) {
                critical_section::with(|_| unsafe {
                    let exint = &*EXINT::ptr();
                    // drop any edge latched while masked
                    exint.eifr.write(|w| w.bits(bit(pin)));
                    exint.eimsk.modify(|r, w| w.bits(r.bits() | bit(pin)));
                });
            }
        }

        fn disable_change_interrupt(&self, pin: PinId) {
            if self.is_valid(pin) {
                critical_section::with(|_| unsafe {
                    (*EXINT::ptr()).eimsk.modify(|r, w| w.bits(r.bits() & !bit(pin)));
                });
            }
        }

        fn is_change_interrupt_enabled(&self, pin: PinId) -> bool {
            self.is_valid(pin) && unsafe { (*EXINT::ptr()).eimsk.read().bits() & bit(pin) != 0 }
        }
    }
}
