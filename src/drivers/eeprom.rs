//! Interrupt-driven EEPROM writer
//!
//! One write may be in flight per device, guarded by a [`Lock`]. The first
//! byte is started by [`Eeprom::write`]; every following byte is started from
//! the ready interrupt through [`Eeprom::write_interrupt`]. When the last
//! byte is committed the lock is released and the request waits for
//! [`Eeprom::handle_events`] to deliver the completion in the main loop.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::hal::eeprom::EepromDevice;
use crate::os::EventHandler;
use crate::rtos::Lock;
use crate::Error;

/// Notified once per finished [`Eeprom::write`], from the main loop.
pub trait EepromListener: Sync {
    fn eeprom_done(&self, device: u8, address: u16, buffer: &[u8]);
}

#[derive(Clone, Copy)]
struct WriteRequest<'a> {
    address: u16,
    buffer: &'a [u8],
    written: u16,
    listener: Option<&'a dyn EepromListener>,
}

struct State<'a> {
    request: Option<WriteRequest<'a>>,
    completed: Option<WriteRequest<'a>>,
}

pub struct Eeprom<'a, D> {
    id: u8,
    device: D,
    lock: Lock,
    state: Mutex<RefCell<State<'a>>>,
}

/// CRC-16 with polynomial 0xA001 (reflected 0x8005), one byte at a time.
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ byte as u16;
    for _ in 0..8 {
        crc = if crc & 1 != 0 {
            (crc >> 1) ^ 0xA001
        } else {
            crc >> 1
        };
    }
    crc
}

impl<'a, D: EepromDevice> Eeprom<'a, D> {
    pub const fn new(id: u8, device: D) -> Self {
        Self {
            id,
            device,
            lock: Lock::new(),
            state: Mutex::new(RefCell::new(State {
                request: None,
                completed: None,
            })),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn check_range(&self, address: u16, len: usize) -> Result<(), Error> {
        if address as usize + len <= self.device.capacity() as usize {
            Ok(())
        } else {
            Err(Error::OutOfRange)
        }
    }

    fn write_in_flight(&self) -> bool {
        self.lock.check() || self.device.is_write_busy()
    }

    /// A write is in flight, the hardware is committing a byte, or a
    /// completion has not been delivered yet.
    pub fn is_busy(&self) -> bool {
        self.write_in_flight()
            || critical_section::with(|cs| self.state.borrow_ref(cs).completed.is_some())
    }

    /// Start writing `buffer` at `address`.
    ///
    /// Returns [`nb::Error::WouldBlock`] without touching the request in
    /// flight when the device is busy. `buffer` must stay untouched until
    /// the listener has been called.
    pub fn write(
        &self,
        buffer: &'a [u8],
        address: u16,
        listener: Option<&'a dyn EepromListener>,
    ) -> nb::Result<(), Error> {
        if buffer.is_empty() {
            return Err(nb::Error::Other(Error::InvalidLength));
        }
        self.check_range(address, buffer.len())
            .map_err(nb::Error::Other)?;

        if !self.lock.obtain() {
            return Err(nb::Error::WouldBlock);
        }

        let started = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.completed.is_some() || self.device.is_write_busy() {
                return false;
            }
            state.request = Some(WriteRequest {
                address,
                buffer,
                written: 0,
                listener,
            });
            true
        });
        if !started {
            self.lock.release();
            return Err(nb::Error::WouldBlock);
        }

        log::trace!("eeprom {}: writing {} bytes at {}", self.id, buffer.len(), address);
        self.device.start_byte_write(address, buffer[0]);
        Ok(())
    }

    /// Ready interrupt entry point: the previous byte is committed.
    ///
    /// Starts the next byte or finishes the request. With no request in
    /// flight it only masks the interrupt.
    pub fn write_interrupt(&self) {
        let next = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let Some(request) = state.request.as_mut() else {
                self.device.disable_ready_interrupt();
                return None;
            };

            request.written += 1;
            if request.written as usize >= request.buffer.len() {
                self.device.disable_ready_interrupt();
                state.completed = state.request.take();
                self.lock.release();
                None
            } else {
                let offset = request.written;
                Some((
                    request.address.wrapping_add(offset),
                    request.buffer[offset as usize],
                ))
            }
        });

        if let Some((address, value)) = next {
            self.device.start_byte_write(address, value);
        }
    }

    /// Deliver a finished write to its listener.
    ///
    /// Returns whether a completion was delivered.
    pub fn handle_events(&self) -> bool {
        let done = critical_section::with(|cs| self.state.borrow_ref_mut(cs).completed.take());
        match done {
            Some(request) => {
                log::debug!(
                    "eeprom {}: wrote {} bytes at {}",
                    self.id,
                    request.buffer.len(),
                    request.address
                );
                if let Some(listener) = request.listener {
                    listener.eeprom_done(self.id, request.address, request.buffer);
                }
                true
            }
            None => false,
        }
    }

    pub fn read(&self, address: u16) -> nb::Result<u8, Error> {
        self.check_range(address, 1).map_err(nb::Error::Other)?;
        if self.write_in_flight() {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.device.read_byte(address))
    }

    pub fn read_into(&self, buffer: &mut [u8], address: u16) -> nb::Result<(), Error> {
        self.check_range(address, buffer.len())
            .map_err(nb::Error::Other)?;
        if self.write_in_flight() {
            return Err(nb::Error::WouldBlock);
        }
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = self.device.read_byte(address + offset as u16);
        }
        Ok(())
    }

    /// Spin until the device is readable, then read.
    pub fn busy_read(&self, address: u16) -> Result<u8, Error> {
        nb::block!(self.read(address))
    }

    pub fn busy_read_into(&self, buffer: &mut [u8], address: u16) -> Result<(), Error> {
        nb::block!(self.read_into(buffer, address))
    }

    /// Start a single byte write without the ready interrupt.
    pub fn write_byte(&self, address: u16, value: u8) -> nb::Result<(), Error> {
        self.check_range(address, 1).map_err(nb::Error::Other)?;
        let Some(_guard) = self.lock.try_lock() else {
            return Err(nb::Error::WouldBlock);
        };
        if self.device.is_write_busy() {
            return Err(nb::Error::WouldBlock);
        }
        self.device.write_byte(address, value);
        Ok(())
    }

    /// Write `buffer` synchronously, spinning on the hardware busy flag
    /// between bytes. Waits for any interrupt-driven write to finish first.
    ///
    /// Must not be called from interrupt context.
    pub fn busy_write(&self, buffer: &[u8], address: u16) -> Result<(), Error> {
        if buffer.is_empty() {
            return Err(Error::InvalidLength);
        }
        self.check_range(address, buffer.len())?;

        let _guard = loop {
            if let Some(guard) = self.lock.try_lock() {
                break guard;
            }
        };
        for (offset, &value) in buffer.iter().enumerate() {
            while self.device.is_write_busy() {}
            self.device.write_byte(address + offset as u16, value);
        }
        log::debug!("eeprom {}: wrote {} bytes at {} (blocking)", self.id, buffer.len(), address);
        Ok(())
    }

    /// CRC-16 over `len` bytes starting at `address`, initial value 0.
    pub fn crc(&self, address: u16, len: u16) -> nb::Result<u16, Error> {
        self.check_range(address, len as usize)
            .map_err(nb::Error::Other)?;
        if self.write_in_flight() {
            return Err(nb::Error::WouldBlock);
        }
        Ok((0..len).fold(0, |crc, offset| {
            crc16_update(crc, self.device.read_byte(address + offset))
        }))
    }
}

impl<D: EepromDevice> EventHandler for Eeprom<'_, D> {
    fn handle_events(&self) {
        Eeprom::handle_events(self);
    }
}
