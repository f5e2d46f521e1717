pub mod eeprom;
pub mod gpio;
pub mod sim;
pub mod timer;
#[cfg(target_arch = "avr")]
pub mod uart;

// Re-export commonly used types
pub use eeprom::EepromDevice;
pub use gpio::{ChangeInterrupts, InputPins, PinId, PinIo, PinRead};
pub use timer::{Prescaler, TickSource, TimerConfig};
#[cfg(target_arch = "avr")]
pub use uart::Uart;
