//! Byte-level EEPROM access
//!
//! The write pipeline in [`drivers::eeprom`](crate::drivers::eeprom) is
//! written against [`EepromDevice`]; the ATmega128 implementation drives the
//! EEAR/EEDR/EECR registers and the `EE_READY` interrupt.

pub trait EepromDevice {
    /// Size in bytes.
    fn capacity(&self) -> u16;

    /// A byte write is still being committed.
    fn is_write_busy(&self) -> bool;

    /// Read one byte. Only valid while not write-busy.
    fn read_byte(&self, address: u16) -> u8;

    /// Start a byte write without enabling the ready interrupt.
    fn write_byte(&self, address: u16, value: u8);

    /// Start a byte write and enable the ready interrupt, which fires once
    /// the byte is committed.
    fn start_byte_write(&self, address: u16, value: u8);

    fn disable_ready_interrupt(&self);
}

#[cfg(target_arch = "avr")]
pub use self::atmega128::Atmega128Eeprom;

#[cfg(target_arch = "avr")]
mod atmega128 {
    use super::EepromDevice;
    use crate::config::EEPROM_SIZE;
    use avr_device::atmega128a::EEPROM;

    const EERIE: u8 = 1 << 3;
    const EEMWE: u8 = 1 << 2;
    const EEWE: u8 = 1 << 1;
    const EERE: u8 = 1 << 0;

    pub struct Atmega128Eeprom {
        _private: (),
    }

    impl Atmega128Eeprom {
        pub const fn new() -> Self {
            Self { _private: () }
        }

        #[inline]
        fn regs(&self) -> &avr_device::atmega128a::eeprom::RegisterBlock {
            unsafe { &*EEPROM::ptr() }
        }

        /// EEMWE must be followed by EEWE within four cycles, so the pair
        /// runs with interrupts disabled.
        fn program(&self, address: u16, value: u8, interrupt: bool) {
            let regs = self.regs();
            while regs.eecr.read().bits() & EEWE != 0 {}
            critical_section::with(|_| {
                regs.eear.write(|w| unsafe { w.bits(address) });
                regs.eedr.write(|w| unsafe { w.bits(value) });
                let base = if interrupt { EERIE } else { 0 };
                regs.eecr.write(|w| unsafe { w.bits(base | EEMWE) });
                regs.eecr.write(|w| unsafe { w.bits(base | EEMWE | EEWE) });
            });
        }
    }

    impl EepromDevice for Atmega128Eeprom {
        fn capacity(&self) -> u16 {
            EEPROM_SIZE
        }

        fn is_write_busy(&self) -> bool {
            self.regs().eecr.read().bits() & EEWE != 0
        }

        fn read_byte(&self, address: u16) -> u8 {
            let regs = self.regs();
            regs.eear.write(|w| unsafe { w.bits(address) });
            regs.eecr.modify(|r, w| unsafe { w.bits(r.bits() | EERE) });
            regs.eedr.read().bits()
        }

        fn write_byte(&self, address: u16, value: u8) {
            self.program(address, value, false);
        }

        fn start_byte_write(&self, address: u16, value: u8) {
            self.program(address, value, true);
        }

        fn disable_ready_interrupt(&self) {
            self.regs()
                .eecr
                .modify(|r, w| unsafe { w.bits(r.bits() & !EERIE) });
        }
    }
}
