pub mod buttons;
pub mod debounce;
pub mod eeprom;
#[cfg(target_arch = "avr")]
pub mod serial_console;

pub use buttons::{ButtonListener, Buttons};
pub use debounce::{DebounceListener, Debouncer};
pub use eeprom::{Eeprom, EepromListener};
#[cfg(target_arch = "avr")]
pub use serial_console::SerialConsole;
