//! Error taxonomy shared by the runtime components.
//!
//! Busy conditions are not listed here. Operations that may find a resource
//! busy return [`nb::Result`] and report it as [`nb::Error::WouldBlock`].

use core::fmt;
use ufmt::derive::uDebug;

#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A fixed-size table (alarms, debounce slots, handlers) is full
    CapacityExceeded,
    /// Pin id outside the range supported by the pin layer
    InvalidPin,
    /// Zero-length transfer requested
    InvalidLength,
    /// Address range extends past the end of the device
    OutOfRange,
    /// The timer cannot produce the requested tick rate
    UnsupportedRate,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("capacity exceeded"),
            Self::InvalidPin => f.write_str("invalid pin"),
            Self::InvalidLength => f.write_str("invalid length"),
            Self::OutOfRange => f.write_str("address out of range"),
            Self::UnsupportedRate => f.write_str("unsupported tick rate"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for Error {}
