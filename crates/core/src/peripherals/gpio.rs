use crate::SimResult;
use std::any::Any;

pub const PIN: u64 = 0x00;
pub const DDR: u64 = 0x01;
pub const PORT: u64 = 0x02;

/// AVR-style 8-bit GPIO port: PINx, DDRx and PORTx at consecutive addresses.
#[derive(Debug, Default)]
pub struct GpioPort {
    ddr: u8,
    port: u8,
    /// Levels driven onto the pins from outside the chip.
    external: u8,
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive an input pin from outside, e.g. the RTC's SQW line.
    pub fn drive_input(&mut self, bit: u8, high: bool) {
        if high {
            self.external |= 1 << bit;
        } else {
            self.external &= !(1 << bit);
        }
    }

    /// Outputs read back their PORT bit, inputs the external level.
    pub fn pin_state(&self) -> u8 {
        (self.port & self.ddr) | (self.external & !self.ddr)
    }

    pub fn level(&self, bit: u8) -> bool {
        self.pin_state() & (1 << bit) != 0
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&self, offset: u64) -> SimResult<u8> {
        match offset {
            PIN => Ok(self.pin_state()),
            DDR => Ok(self.ddr),
            PORT => Ok(self.port),
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset {
            // Writing ones to PINx toggles the matching PORTx bits.
            PIN => self.port ^= value,
            DDR => self.ddr = value,
            PORT => self.port = value,
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_output_reads_back_port() {
        let mut gpio = GpioPort::new();
        gpio.write(DDR, 0b0010_0000).unwrap();
        gpio.write(PORT, 0b0010_0000).unwrap();
        assert!(gpio.level(5));
        assert_eq!(gpio.read(DDR).unwrap(), 0b0010_0000);
        // External drive is ignored on an output.
        gpio.drive_input(5, false);
        assert!(gpio.level(5));
    }

    #[test]
    fn test_input_follows_external_level() {
        let mut gpio = GpioPort::new();
        gpio.drive_input(2, true);
        assert_eq!(gpio.read(PIN).unwrap(), 0b0000_0100);
        gpio.drive_input(2, false);
        assert!(!gpio.level(2));
    }

    #[test]
    fn test_pin_write_toggles_port() {
        let mut gpio = GpioPort::new();
        gpio.write(DDR, 0xFF).unwrap();
        gpio.write(PIN, 0b1000_0000).unwrap();
        assert_eq!(gpio.read(PORT).unwrap(), 0b1000_0000);
        gpio.write(PIN, 0b1000_0000).unwrap();
        assert_eq!(gpio.read(PORT).unwrap(), 0);
    }
}
