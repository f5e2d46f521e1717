use crate::hal::Uart;
use core::convert::Infallible;
use core::fmt;

/// Line-oriented text output over USART0, used as the log sink.
pub struct SerialConsole {
    uart: Uart,
}

impl SerialConsole {
    pub const fn new() -> Self {
        Self { uart: Uart::new() }
    }

    pub fn init(&self) {
        self.uart.init();
    }

    pub fn write_line(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_bytes(b"\r\n");
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.uart.read_byte()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.uart.write_byte(byte);
        }
    }
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for SerialConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl ufmt::uWrite for SerialConsole {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
