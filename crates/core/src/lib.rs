pub mod bus;
pub mod flag;
pub mod hal;
pub mod peripherals;
pub mod rtc;
pub mod setup;
pub mod sketch;
pub mod snapshot;
pub mod variant;

use std::any::Any;
use std::sync::Arc;

use hal::{DigitalIo, Direction, InterruptControl, Level, Millis, RtcDriver, SerialOut};
use peripherals::ds1307::Ds1307;
use peripherals::gpio::GpioPort;
use peripherals::timer::CompareTimer;
use peripherals::uart::{self, Uart};
use sqwclock_config::BoardConfig;
use variant::{ActiveVariant, Pin, Variant, UART0_BASE};

pub use flag::TickFlag;
pub use sketch::{PollOutcome, Sketch};


#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Peripheral '{0}' is not mapped")]
    MissingPeripheral(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the data-space bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let lo = self.read_u8(addr)? as u16;
        let hi = self.read_u8(addr + 1)? as u16;
        // Little Endian
        Ok(lo | (hi << 8))
    }

    /// 16-bit timer registers latch on the low byte, so the high byte goes
    /// first.
    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr + 1, (value >> 8) as u8)?;
        self.write_u8(addr, (value & 0xFF) as u8)?;
        Ok(())
    }
}

/// The board the sketch runs on: MCU peripherals, the DS1307 with its SQW
/// wired to the timer input, and a millisecond clock.
#[derive(Debug)]
pub struct Board<V: Variant = ActiveVariant> {
    pub bus: bus::SystemBus,
    pub rtc: Ds1307,
    pub rtc_driver: rtc::Ds1307Driver,
    pub sketch: Sketch<V>,
    flag: Arc<TickFlag>,
    now_ms: u32,
    interrupts_enabled: bool,
    powered: bool,
}

impl<V: Variant> Board<V> {
    pub fn new(config: &BoardConfig) -> Self {
        let flag = Arc::new(TickFlag::new());
        Self {
            bus: bus::SystemBus::for_profile(&V::PROFILE, config.uart_echo),
            rtc: Ds1307::with_time(config.rtc.start, config.rtc.halted),
            rtc_driver: rtc::Ds1307Driver::new(),
            sketch: Sketch::new(flag.clone()),
            flag,
            now_ms: 0,
            interrupts_enabled: false,
            powered: false,
        }
    }

    pub fn flag(&self) -> &Arc<TickFlag> {
        &self.flag
    }

    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.bus.peripheral::<Uart>("uart0")
    }

    pub fn timer(&self) -> Option<&CompareTimer> {
        self.bus.peripheral::<CompareTimer>("timer")
    }

    /// Run the sketch's setup. The runtime enables interrupts before setup,
    /// like the Arduino core does. Setup runs once per board; later calls
    /// are no-ops.
    pub fn power_on(&mut self) -> SimResult<()> {
        if self.powered {
            tracing::debug!("Board already powered, skipping setup");
            return Ok(());
        }
        tracing::info!("Powering on {} board", V::PROFILE.board);
        self.interrupts_enabled = true;
        let mut hal = BoardHal {
            bus: &mut self.bus,
            rtc: &mut self.rtc,
            driver: &mut self.rtc_driver,
            now_ms: self.now_ms,
            interrupts_enabled: &mut self.interrupts_enabled,
        };
        self.sketch.setup(&mut hal)?;
        self.powered = true;
        Ok(())
    }

    /// Advance one millisecond: RTC, SQW wire, timer, interrupt dispatch,
    /// then one main-loop iteration.
    pub fn step(&mut self) -> SimResult<PollOutcome> {
        if !self.powered {
            self.power_on()?;
        }

        self.now_ms = self.now_ms.wrapping_add(1);
        self.rtc.tick_ms();

        let clock_pin = V::PROFILE.clock_pin;
        let level = {
            let port = self
                .bus
                .peripheral_at_mut::<GpioPort>(clock_pin.port.base as u64)
                .ok_or_else(|| {
                    SimulationError::MissingPeripheral(format!("port {}", clock_pin.port.name))
                })?;
            port.drive_input(clock_pin.bit, self.rtc.sqw_level());
            port.level(clock_pin.bit)
        };

        let timer = self
            .bus
            .peripheral_mut::<CompareTimer>("timer")
            .ok_or_else(|| SimulationError::MissingPeripheral("timer".to_string()))?;
        timer.clock_input(level);
        if self.interrupts_enabled && timer.irq_pending() {
            timer.acknowledge();
            tracing::debug!(
                "TIMER{}_COMPA (vector {}) at {} ms",
                V::PROFILE.timer,
                V::PROFILE.compare_vector,
                self.now_ms
            );
            sketch::compare_match_isr(&self.flag);
        }

        let mut hal = BoardHal {
            bus: &mut self.bus,
            rtc: &mut self.rtc,
            driver: &mut self.rtc_driver,
            now_ms: self.now_ms,
            interrupts_enabled: &mut self.interrupts_enabled,
        };
        Ok(self.sketch.poll(&mut hal))
    }

    /// Step for `duration_ms` milliseconds. Returns the number of compare
    /// match events the loop handled.
    pub fn run(&mut self, duration_ms: u64) -> SimResult<u64> {
        let before = self.sketch.ticks();
        for _ in 0..duration_ms {
            self.step()?;
        }
        Ok(self.sketch.ticks() - before)
    }

    pub fn snapshot(&self) -> snapshot::BoardSnapshot {
        snapshot::BoardSnapshot::capture(self)
    }

    /// Current RTC time, read through the driver.
    pub fn rtc_time(&mut self) -> sqwclock_config::TimeOfDay {
        self.rtc_driver.refresh(&self.rtc);
        self.rtc_driver.now()
    }
}

/// The sketch's view of the board for the duration of one call.
struct BoardHal<'a> {
    bus: &'a mut bus::SystemBus,
    rtc: &'a mut Ds1307,
    driver: &'a mut rtc::Ds1307Driver,
    now_ms: u32,
    interrupts_enabled: &'a mut bool,
}

impl BoardHal<'_> {
    fn modify(&mut self, addr: u16, f: impl FnOnce(u8) -> u8) {
        let addr = addr as u64;
        let res = self
            .bus
            .read_u8(addr)
            .and_then(|v| self.bus.write_u8(addr, f(v)));
        if let Err(e) = res {
            tracing::warn!("GPIO access failed: {}", e);
        }
    }
}

impl RtcDriver for BoardHal<'_> {
    fn enable_square_wave_1hz(&mut self) {
        self.driver.enable_square_wave_1hz(self.rtc);
    }

    fn refresh(&mut self) {
        self.driver.refresh(self.rtc);
    }

    fn seconds(&self) -> u8 {
        self.driver.seconds()
    }

    fn is_running(&self) -> bool {
        self.driver.is_running(self.rtc)
    }

    fn start_oscillator(&mut self) {
        self.driver.start_oscillator(self.rtc);
    }
}

impl SerialOut for BoardHal<'_> {
    fn write_line(&mut self, line: &str) {
        let udr = UART0_BASE as u64 + uart::UDR;
        for byte in line.bytes().chain(*b"\r\n") {
            if let Err(e) = self.bus.write_u8(udr, byte) {
                tracing::warn!("UART write failed: {}", e);
                return;
            }
        }
    }
}

impl DigitalIo for BoardHal<'_> {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        let mask = pin.mask();
        self.modify(pin.port.ddr(), |ddr| match direction {
            Direction::Output => ddr | mask,
            Direction::Input => ddr & !mask,
        });
    }

    fn set_level(&mut self, pin: Pin, level: Level) {
        let mask = pin.mask();
        self.modify(pin.port.port(), |port| {
            if level.is_high() {
                port | mask
            } else {
                port & !mask
            }
        });
    }
}

impl Millis for BoardHal<'_> {
    fn millis(&self) -> u32 {
        self.now_ms
    }
}

impl InterruptControl for BoardHal<'_> {
    fn disable(&mut self) {
        *self.interrupts_enabled = false;
    }

    fn enable(&mut self) {
        *self.interrupts_enabled = true;
    }

    fn enabled(&self) -> bool {
        *self.interrupts_enabled
    }
}

impl Bus for BoardHal<'_> {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        self.bus.read_u8(addr)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        self.bus.write_u8(addr, value)
    }
}
