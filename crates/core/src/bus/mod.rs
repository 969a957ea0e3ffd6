use crate::peripherals::gpio::GpioPort;
use crate::peripherals::timer::CompareTimer;
use crate::peripherals::uart::Uart;
use crate::variant::{TimerProfile, UART0_BASE};
use crate::{Peripheral, SimResult, SimulationError};
use std::any::Any;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl std::fmt::Debug for PeripheralEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralEntry")
            .field("name", &self.name)
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.size)
            .finish()
    }
}

/// AVR data-space I/O map: every register lives at a byte address.
#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the peripherals a board variant needs: the GPIO ports holding the
    /// indicator and clock input pins, the selected timer and UART0.
    pub fn for_profile(profile: &TimerProfile, uart_echo: bool) -> Self {
        let mut bus = Self::new();

        for port in [profile.indicator_pin.port, profile.clock_pin.port] {
            if bus.find(port.base as u64).is_none() {
                bus.attach(
                    &format!("gpio{}", port.name.to_ascii_lowercase()),
                    port.base as u64,
                    3,
                    Box::new(GpioPort::new()),
                );
            }
        }

        bus.attach(
            "timer",
            profile.base as u64,
            0x10,
            Box::new(CompareTimer::new()),
        );
        bus.attach(
            "uart0",
            UART0_BASE as u64,
            7,
            Box::new(Uart::new(uart_echo)),
        );
        bus
    }

    pub fn attach(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        tracing::debug!("Mapping {} at {:#x} (+{:#x})", name, base, size);
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    fn find(&self, addr: u64) -> Option<usize> {
        self.peripherals
            .iter()
            .position(|p| addr >= p.base && addr < p.base + p.size)
    }

    /// Typed access to a mapped peripheral by name.
    pub fn peripheral<T: Any>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peripheral_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
    }

    /// Typed access to the peripheral mapped at `addr`.
    pub fn peripheral_at_mut<T: Any>(&mut self, addr: u64) -> Option<&mut T> {
        let idx = self.find(addr)?;
        self.peripherals[idx]
            .dev
            .as_any_mut()
            .and_then(|any| any.downcast_mut::<T>())
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        match self.find(addr) {
            Some(idx) => {
                let p = &self.peripherals[idx];
                p.dev.read(addr - p.base)
            }
            None => Err(SimulationError::MemoryViolation(addr)),
        }
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        match self.find(addr) {
            Some(idx) => {
                let p = &mut self.peripherals[idx];
                p.dev.write(addr - p.base, value)
            }
            None => Err(SimulationError::MemoryViolation(addr)),
        }
    }
}
