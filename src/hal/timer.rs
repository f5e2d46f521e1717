//! Periodic tick source
//!
//! Timer0 runs in CTC mode and raises `TIMER0_COMP` once per tick. The
//! interrupt handler calls [`Clock::tick`](crate::rtos::Clock::tick).

use crate::rtos::TickRate;
use crate::Error;

pub trait TickSource {
    /// Program the timer period. Fails with [`Error::UnsupportedRate`] when
    /// the rate cannot be produced exactly.
    fn set_rate(&mut self, rate: TickRate) -> Result<(), Error>;
    fn start(&mut self);
    fn stop(&mut self);
}

/// Timer0 clock select. Timer0 on the ATmega128 has the extended
/// asynchronous-timer prescaler set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prescaler {
    Direct = 1,
    Div8 = 2,
    Div32 = 3,
    Div64 = 4,
    Div128 = 5,
    Div256 = 6,
    Div1024 = 7,
}

impl Prescaler {
    pub const ALL: [Prescaler; 7] = [
        Prescaler::Direct,
        Prescaler::Div8,
        Prescaler::Div32,
        Prescaler::Div64,
        Prescaler::Div128,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    pub const fn divisor(self) -> u16 {
        match self {
            Prescaler::Direct => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div32 => 32,
            Prescaler::Div64 => 64,
            Prescaler::Div128 => 128,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }

    /// CS02:CS00 bits
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Prescaler and compare value for an 8-bit timer in CTC mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerConfig {
    pub prescaler: Prescaler,
    pub top: u8,
}

impl TimerConfig {
    /// Smallest prescaler that reaches `rate` exactly with an 8-bit compare
    /// value.
    pub fn for_rate(cpu_hz: u32, rate: TickRate) -> Result<Self, Error> {
        let hz = rate.ticks_per_second() as u32;
        Prescaler::ALL
            .iter()
            .find_map(|&prescaler| {
                let cycles = prescaler.divisor() as u32 * hz;
                if cpu_hz % cycles != 0 {
                    return None;
                }
                let counts = cpu_hz / cycles;
                if (1..=256).contains(&counts) {
                    Some(TimerConfig {
                        prescaler,
                        top: (counts - 1) as u8,
                    })
                } else {
                    None
                }
            })
            .ok_or(Error::UnsupportedRate)
    }

    pub fn rate(&self, cpu_hz: u32) -> Option<TickRate> {
        TickRate::from_timer(cpu_hz, self.prescaler.divisor(), self.top as u16)
    }
}

#[cfg(target_arch = "avr")]
pub use self::timer0::Timer0;

#[cfg(target_arch = "avr")]
mod timer0 {
    use super::*;
    use crate::config::CPU_FREQ_HZ;
    use avr_device::atmega128a::TC0;

    const WGM01: u8 = 1 << 3;
    const OCIE0: u8 = 1 << 1;
    const OCF0: u8 = 1 << 1;
    const CS_MASK: u8 = 0x07;

    // TIMSK and TIFR are shared by all three timers, so they are reached by
    // data-space address rather than through the TC0 register block.
    const TIMSK: *mut u8 = 0x57 as *mut u8;
    const TIFR: *mut u8 = 0x56 as *mut u8;

    fn modify_timsk(f: impl FnOnce(u8) -> u8) {
        critical_section::with(|_| unsafe {
            TIMSK.write_volatile(f(TIMSK.read_volatile()));
        });
    }

    pub struct Timer0 {
        tc0: TC0,
        config: Option<TimerConfig>,
    }

    impl Timer0 {
        pub fn new(tc0: TC0) -> Self {
            tc0.tccr0.write(|w| unsafe { w.bits(0) });
            tc0.tcnt0.write(|w| unsafe { w.bits(0) });
            Self { tc0, config: None }
        }
    }

    impl TickSource for Timer0 {
        fn set_rate(&mut self, rate: TickRate) -> Result<(), Error> {
            let config = TimerConfig::for_rate(CPU_FREQ_HZ, rate)?;
            self.tc0.ocr0.write(|w| unsafe { w.bits(config.top) });
            self.config = Some(config);
            Ok(())
        }

        fn start(&mut self) {
            let Some(config) = self.config else {
                return;
            };
            self.tc0.tcnt0.write(|w| unsafe { w.bits(0) });
            // flags clear by writing one
            unsafe { TIFR.write_volatile(OCF0) };
            modify_timsk(|timsk| timsk | OCIE0);
            self.tc0
                .tccr0
                .write(|w| unsafe { w.bits(WGM01 | (config.prescaler.bits() & CS_MASK)) });
        }

        fn stop(&mut self) {
            self.tc0.tccr0.modify(|r, w| unsafe { w.bits(r.bits() & !CS_MASK) });
            modify_timsk(|timsk| timsk & !OCIE0);
        }
    }
}
