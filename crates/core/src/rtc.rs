use crate::peripherals::ds1307::{self, Ds1307};
use sqwclock_config::TimeOfDay;

pub fn bcd_to_bin(value: u8) -> u8 {
    (value & 0x0F) + (value >> 4) * 10
}

pub fn bin_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Driver for the DS1307. Keeps the time of the last `refresh` so repeated
/// field reads don't go back to the chip.
#[derive(Debug, Default, Clone)]
pub struct Ds1307Driver {
    now: TimeOfDay,
}

impl Ds1307Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, chip: &Ds1307) {
        let seconds = bcd_to_bin(chip.read_register(ds1307::SECONDS) & !ds1307::CH);
        let minutes = bcd_to_bin(chip.read_register(ds1307::MINUTES) & 0x7F);
        let raw_hours = chip.read_register(ds1307::HOURS);
        let hours = if raw_hours & ds1307::HOUR_12 != 0 {
            let h = bcd_to_bin(raw_hours & 0x1F) % 12;
            if raw_hours & ds1307::PM != 0 {
                h + 12
            } else {
                h
            }
        } else {
            bcd_to_bin(raw_hours & 0x3F)
        };
        self.now = TimeOfDay {
            hours,
            minutes,
            seconds,
        };
    }

    pub fn now(&self) -> TimeOfDay {
        self.now
    }

    pub fn seconds(&self) -> u8 {
        self.now.seconds
    }

    pub fn is_running(&self, chip: &Ds1307) -> bool {
        !chip.is_halted()
    }

    /// SQW/OUT as a 1 Hz square wave.
    pub fn enable_square_wave_1hz(&self, chip: &mut Ds1307) {
        chip.write_register(ds1307::CONTROL, ds1307::SQWE | ds1307::RS_1HZ);
    }

    /// Clear CH while keeping the stored seconds.
    pub fn start_oscillator(&self, chip: &mut Ds1307) {
        let seconds = chip.read_register(ds1307::SECONDS);
        chip.write_register(ds1307::SECONDS, seconds & !ds1307::CH);
    }
}
