//! Polled USART0 driver.

use avr_device::atmega128a::USART0;
use embedded_hal::serial;

use crate::config::{CPU_FREQ_HZ, UART_BAUD};

const RXC: u8 = 1 << 7;
const UDRE: u8 = 1 << 5;
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;
// 8 data bits, no parity, 1 stop bit
const UCSZ_8N1: u8 = 0b0000_0110;

const fn ubrr(baud: u32) -> u16 {
    (CPU_FREQ_HZ / (16 * baud) - 1) as u16
}

/// Handle to USART0. Registers are reached through the PAC pointer so the
/// handle can live in a `static`.
pub struct Uart {
    _private: (),
}

impl Uart {
    pub const fn new() -> Self {
        Self { _private: () }
    }

    #[inline]
    fn regs(&self) -> &avr_device::atmega128a::usart0::RegisterBlock {
        unsafe { &*USART0::ptr() }
    }

    /// Set the baud rate and enable the transmitter and receiver.
    pub fn init(&self) {
        let regs = self.regs();
        let divisor = ubrr(UART_BAUD);
        regs.ubrr0h.write(|w| unsafe { w.bits((divisor >> 8) as u8) });
        regs.ubrr0l.write(|w| unsafe { w.bits(divisor as u8) });
        regs.ucsr0c.write(|w| unsafe { w.bits(UCSZ_8N1) });
        regs.ucsr0b.write(|w| unsafe { w.bits(RXEN | TXEN) });
    }

    pub fn write_byte(&mut self, byte: u8) {
        let _ = nb::block!(serial::Write::write(self, byte));
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        serial::Read::read(self).ok()
    }
}

impl serial::Read<u8> for Uart {
    type Error = core::convert::Infallible;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let regs = self.regs();
        if regs.ucsr0a.read().bits() & RXC == 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(regs.udr0.read().bits())
    }
}

impl serial::Write<u8> for Uart {
    type Error = core::convert::Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        let regs = self.regs();
        if regs.ucsr0a.read().bits() & UDRE == 0 {
            return Err(nb::Error::WouldBlock);
        }
        regs.udr0.write(|w| unsafe { w.bits(byte) });
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.regs().ucsr0a.read().bits() & UDRE == 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}
