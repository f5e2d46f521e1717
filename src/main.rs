#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use atmega_runtime::config::{LOG_LEVEL, TICK_RATE};
    use atmega_runtime::drivers::{
        ButtonListener, Buttons, Debouncer, Eeprom, EepromListener, SerialConsole,
    };
    use atmega_runtime::hal::eeprom::Atmega128Eeprom;
    use atmega_runtime::hal::gpio::{ExtInt, PinId, PinRead};
    use atmega_runtime::hal::timer::Timer0;
    use atmega_runtime::logger::{self, Logger};
    use atmega_runtime::rtos::{Alarm, AlarmListener, Clock, Duration, Scheduler};
    use atmega_runtime::Runtime;

    // Global state shared with the interrupt handlers
    static CLOCK: Clock = Clock::new(TICK_RATE);
    static SCHEDULER: Scheduler<'static> = Scheduler::new(&CLOCK);
    static PINS: ExtInt = ExtInt::new();
    static DEBOUNCER: Debouncer<'static, ExtInt> = Debouncer::new(&SCHEDULER, &PINS);
    static BUTTONS: Buttons<'static> = Buttons::new(&SCHEDULER);
    static EEPROM: Eeprom<'static, Atmega128Eeprom> = Eeprom::new(0, Atmega128Eeprom::new());
    static LOGGER: Logger<'static, SerialConsole> =
        Logger::new(SerialConsole::new(), LOG_LEVEL).with_clock(&CLOCK);

    // EEPROM layout
    const BOOT_COUNT_ADDR: u16 = 0;
    const SIGNATURE_ADDR: u16 = 1;
    static SIGNATURE: [u8; 4] = *b"ATRT";

    struct Keys;

    impl ButtonListener for Keys {
        fn single_press(&self, pin: PinId, held_for: Duration) {
            log::info!("key {} pressed for {}", pin, TICK_RATE.to_millis(held_for));
        }

        fn held_down(&self, pin: PinId, _held_for: Duration) {
            log::info!("key {} held", pin);
        }
    }

    struct Heartbeat;

    impl AlarmListener for Heartbeat {
        fn alarm(&self, alarm: &Alarm) {
            log::debug!("heartbeat {}", alarm.when());
        }
    }

    struct SignatureWritten;

    impl EepromListener for SignatureWritten {
        fn eeprom_done(&self, device: u8, address: u16, buffer: &[u8]) {
            log::info!("eeprom {}: {} signature bytes at {}", device, buffer.len(), address);
        }
    }

    static KEYS: Keys = Keys;
    static HEARTBEAT: Heartbeat = Heartbeat;
    static SIGNATURE_WRITTEN: SignatureWritten = SignatureWritten;

    #[avr_device::entry]
    fn main() -> ! {
        let Some(dp) = avr_device::atmega128a::Peripherals::take() else {
            panic!();
        };

        LOGGER.with_sink(|console| console.init());
        // Interrupts are still disabled and nothing has logged yet
        let _ = unsafe { logger::init(&LOGGER) };
        log::info!("atmega_runtime v{}", env!("CARGO_PKG_VERSION"));

        PINS.init();
        for pin in 0..PINS.pin_count() as PinId {
            let assigned = BUTTONS
                .assign(pin, &KEYS, PINS.pin_read(pin))
                .and_then(|()| DEBOUNCER.assign(pin, &BUTTONS));
            if let Err(err) = assigned {
                log::warn!("pin {}: {}", pin, err);
            }
        }
        if let Err(err) = BUTTONS.start() {
            log::warn!("buttons: {}", err);
        }

        let mut runtime: Runtime<'static> = Runtime::new(&SCHEDULER);
        if let Err(err) = runtime.register(&EEPROM) {
            log::warn!("eeprom: {}", err);
        }

        if let Err(err) =
            SCHEDULER.add_repeating_alarm(&HEARTBEAT, TICK_RATE.seconds(1), TICK_RATE.seconds(1))
        {
            log::warn!("heartbeat: {}", err);
        }

        // Synchronous path: interrupts are not running yet
        let boots = EEPROM.busy_read(BOOT_COUNT_ADDR).unwrap_or(0).wrapping_add(1);
        if EEPROM.busy_write(&[boots], BOOT_COUNT_ADDR).is_ok() {
            log::info!("boot {}", boots);
        }

        let mut stored = [0u8; 4];
        let signed = EEPROM.busy_read_into(&mut stored, SIGNATURE_ADDR).is_ok() && stored == SIGNATURE;
        if !signed {
            // Finishes from EE_READY once interrupts are enabled
            let _ = nb::block!(EEPROM.write(&SIGNATURE, SIGNATURE_ADDR, Some(&SIGNATURE_WRITTEN)));
        } else if let Ok(crc) = EEPROM.crc(SIGNATURE_ADDR, SIGNATURE.len() as u16) {
            log::debug!("signature crc {}", crc);
        }

        let mut timer = Timer0::new(dp.TC0);
        if let Err(err) = runtime.start(&mut timer) {
            log::error!("tick source: {}", err);
        }

        unsafe { avr_device::interrupt::enable() };

        runtime.run(avr_device::asm::sleep)
    }

    #[avr_device::interrupt(atmega128a)]
    fn TIMER0_COMP() {
        CLOCK.tick();
    }

    #[avr_device::interrupt(atmega128a)]
    fn INT4() {
        let _ = DEBOUNCER.pin_change(0);
    }

    #[avr_device::interrupt(atmega128a)]
    fn INT5() {
        let _ = DEBOUNCER.pin_change(1);
    }

    #[avr_device::interrupt(atmega128a)]
    fn INT6() {
        let _ = DEBOUNCER.pin_change(2);
    }

    #[avr_device::interrupt(atmega128a)]
    fn INT7() {
        let _ = DEBOUNCER.pin_change(3);
    }

    #[avr_device::interrupt(atmega128a)]
    fn EE_READY() {
        EEPROM.write_interrupt();
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    eprintln!("atmega_runtime firmware only runs on the ATmega128");
}
