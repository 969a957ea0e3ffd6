use crate::rtc::{bcd_to_bin, bin_to_bcd};
use sqwclock_config::TimeOfDay;

pub const SECONDS: u8 = 0x00;
pub const MINUTES: u8 = 0x01;
pub const HOURS: u8 = 0x02;
pub const DAY: u8 = 0x03;
pub const DATE: u8 = 0x04;
pub const MONTH: u8 = 0x05;
pub const YEAR: u8 = 0x06;
pub const CONTROL: u8 = 0x07;
pub const RAM_START: u8 = 0x08;
pub const REGISTER_COUNT: usize = 0x40;

/// Clock halt, bit 7 of the seconds register.
pub const CH: u8 = 1 << 7;
/// 12-hour mode select in the hours register.
pub const HOUR_12: u8 = 1 << 6;
pub const PM: u8 = 1 << 5;
pub const OUT: u8 = 1 << 7;
pub const SQWE: u8 = 1 << 4;
pub const RS_MASK: u8 = 0b11;
pub const RS_1HZ: u8 = 0b00;

const MS_PER_SECOND: u16 = 1000;

/// DS1307 serial real-time clock.
///
/// Timekeeping registers are BCD. The oscillator is modelled at millisecond
/// resolution: the 1 Hz SQW output is low for the first half of each second
/// and high for the second, so its falling edge lands on the seconds
/// increment. The faster SQW rates cannot be resolved at this granularity
/// and read as a steady high.
#[derive(Debug, Clone)]
pub struct Ds1307 {
    regs: [u8; REGISTER_COUNT],
    /// Position inside the current second.
    sub_ms: u16,
}

impl Default for Ds1307 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ds1307 {
    /// First power-up state: 01/01/00 00:00:00, oscillator halted,
    /// SQW disabled with RS1:RS0 = 11.
    pub fn new() -> Self {
        let mut regs = [0u8; REGISTER_COUNT];
        regs[SECONDS as usize] = CH;
        regs[DAY as usize] = 0x01;
        regs[DATE as usize] = 0x01;
        regs[MONTH as usize] = 0x01;
        regs[CONTROL as usize] = RS_MASK;
        Self { regs, sub_ms: 0 }
    }

    /// A chip already keeping `time`, optionally with the oscillator halted.
    pub fn with_time(time: TimeOfDay, halted: bool) -> Self {
        let mut chip = Self::new();
        let ch = if halted { CH } else { 0 };
        chip.write_register(SECONDS, bin_to_bcd(time.seconds) | ch);
        chip.write_register(MINUTES, bin_to_bcd(time.minutes));
        chip.write_register(HOURS, bin_to_bcd(time.hours));
        chip
    }

    pub fn read_register(&self, addr: u8) -> u8 {
        self.regs[addr as usize % REGISTER_COUNT]
    }

    pub fn write_register(&mut self, addr: u8, value: u8) {
        let addr = addr as usize % REGISTER_COUNT;
        self.regs[addr] = value;
        // Writing the seconds register restarts the countdown chain.
        if addr == SECONDS as usize {
            self.sub_ms = 0;
        }
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }

    pub fn is_halted(&self) -> bool {
        self.regs[SECONDS as usize] & CH != 0
    }

    /// Advance the oscillator by one millisecond.
    pub fn tick_ms(&mut self) {
        if self.is_halted() {
            return;
        }
        self.sub_ms += 1;
        if self.sub_ms == MS_PER_SECOND {
            self.sub_ms = 0;
            self.advance_second();
        }
    }

    pub fn sqw_level(&self) -> bool {
        let control = self.regs[CONTROL as usize];
        if control & SQWE == 0 {
            return control & OUT != 0;
        }
        match control & RS_MASK {
            RS_1HZ => self.sub_ms >= MS_PER_SECOND / 2,
            _ => true,
        }
    }

    fn advance_second(&mut self) {
        let seconds = bcd_to_bin(self.regs[SECONDS as usize] & 0x7F) + 1;
        if seconds < 60 {
            self.regs[SECONDS as usize] = bin_to_bcd(seconds);
            return;
        }
        self.regs[SECONDS as usize] = 0;

        let minutes = bcd_to_bin(self.regs[MINUTES as usize] & 0x7F) + 1;
        if minutes < 60 {
            self.regs[MINUTES as usize] = bin_to_bcd(minutes);
            return;
        }
        self.regs[MINUTES as usize] = 0;

        if !self.advance_hour() {
            return;
        }

        let day = bcd_to_bin(self.regs[DAY as usize] & 0x07);
        self.regs[DAY as usize] = if day >= 7 { 1 } else { day + 1 };

        let year = bcd_to_bin(self.regs[YEAR as usize]);
        let month = bcd_to_bin(self.regs[MONTH as usize] & 0x1F);
        let date = bcd_to_bin(self.regs[DATE as usize] & 0x3F) + 1;
        if date <= days_in_month(month, year) {
            self.regs[DATE as usize] = bin_to_bcd(date);
            return;
        }
        self.regs[DATE as usize] = 0x01;

        if month < 12 {
            self.regs[MONTH as usize] = bin_to_bcd(month + 1);
            return;
        }
        self.regs[MONTH as usize] = 0x01;
        self.regs[YEAR as usize] = bin_to_bcd((year + 1) % 100);
    }

    /// Returns true when the day rolled over.
    fn advance_hour(&mut self) -> bool {
        let raw = self.regs[HOURS as usize];
        if raw & HOUR_12 == 0 {
            let hours = bcd_to_bin(raw & 0x3F) + 1;
            if hours < 24 {
                self.regs[HOURS as usize] = bin_to_bcd(hours);
                return false;
            }
            self.regs[HOURS as usize] = 0;
            return true;
        }

        // 12-hour mode: 11 -> 12 flips AM/PM, 12 -> 1 keeps it.
        let hours = bcd_to_bin(raw & 0x1F);
        let pm = raw & PM != 0;
        match hours {
            11 => {
                self.regs[HOURS as usize] = HOUR_12 | (if pm { 0 } else { PM }) | bin_to_bcd(12);
                pm
            }
            12 => {
                self.regs[HOURS as usize] = HOUR_12 | (raw & PM) | 0x01;
                false
            }
            h => {
                self.regs[HOURS as usize] = HOUR_12 | (raw & PM) | bin_to_bcd(h + 1);
                false
            }
        }
    }
}

fn days_in_month(month: u8, year: u8) -> u8 {
    match month {
        2 if year % 4 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_at(h: u8, m: u8, s: u8) -> Ds1307 {
        Ds1307::with_time(TimeOfDay::new(h, m, s).unwrap(), false)
    }

    fn run_ms(chip: &mut Ds1307, ms: u32) {
        for _ in 0..ms {
            chip.tick_ms();
        }
    }

    #[test]
    fn test_power_up_state() {
        let chip = Ds1307::new();
        assert!(chip.is_halted());
        assert_eq!(chip.read_register(CONTROL), 0x03);
        assert_eq!(chip.read_register(DATE), 0x01);
    }

    #[test]
    fn test_halted_chip_does_not_count() {
        let mut chip = Ds1307::with_time(TimeOfDay::new(1, 2, 3).unwrap(), true);
        run_ms(&mut chip, 5000);
        assert_eq!(chip.read_register(SECONDS), CH | 0x03);
    }

    #[test]
    fn test_seconds_increment_in_bcd() {
        let mut chip = running_at(0, 0, 9);
        run_ms(&mut chip, 999);
        assert_eq!(chip.read_register(SECONDS), 0x09);
        chip.tick_ms();
        assert_eq!(chip.read_register(SECONDS), 0x10);
    }

    #[test]
    fn test_rollover_to_next_day() {
        let mut chip = running_at(23, 59, 59);
        run_ms(&mut chip, 1000);
        assert_eq!(chip.read_register(SECONDS), 0);
        assert_eq!(chip.read_register(MINUTES), 0);
        assert_eq!(chip.read_register(HOURS), 0);
        assert_eq!(chip.read_register(DATE), 0x02);
        assert_eq!(chip.read_register(DAY), 0x02);
    }

    #[test]
    fn test_month_and_year_rollover() {
        let mut chip = running_at(23, 59, 59);
        chip.write_register(DATE, 0x31);
        chip.write_register(MONTH, 0x12);
        chip.write_register(YEAR, 0x99);
        run_ms(&mut chip, 1000);
        assert_eq!(chip.read_register(DATE), 0x01);
        assert_eq!(chip.read_register(MONTH), 0x01);
        assert_eq!(chip.read_register(YEAR), 0x00);
    }

    #[test]
    fn test_leap_february() {
        let mut chip = running_at(23, 59, 59);
        chip.write_register(DATE, 0x28);
        chip.write_register(MONTH, 0x02);
        chip.write_register(YEAR, 0x24);
        run_ms(&mut chip, 1000);
        assert_eq!(chip.read_register(DATE), 0x29);
        assert_eq!(chip.read_register(MONTH), 0x02);
    }

    #[test]
    fn test_twelve_hour_mode() {
        let mut chip = running_at(0, 59, 59);
        // 11:59:59 AM
        chip.write_register(HOURS, HOUR_12 | 0x11);
        run_ms(&mut chip, 1000);
        assert_eq!(chip.read_register(HOURS), HOUR_12 | PM | 0x12);
        // 12:59:59 PM -> 01:00:00 PM
        chip.write_register(MINUTES, 0x59);
        chip.write_register(SECONDS, 0x59);
        run_ms(&mut chip, 1000);
        assert_eq!(chip.read_register(HOURS), HOUR_12 | PM | 0x01);
    }

    #[test]
    fn test_one_hz_square_wave_phase() {
        let mut chip = running_at(0, 0, 0);
        chip.write_register(CONTROL, SQWE | RS_1HZ);
        assert!(!chip.sqw_level());
        run_ms(&mut chip, 499);
        assert!(!chip.sqw_level());
        chip.tick_ms();
        assert!(chip.sqw_level());
        run_ms(&mut chip, 499);
        assert!(chip.sqw_level());
        // Falling edge together with the seconds increment
        chip.tick_ms();
        assert!(!chip.sqw_level());
        assert_eq!(chip.read_register(SECONDS), 0x01);
    }

    #[test]
    fn test_sqw_disabled_follows_out_bit() {
        let mut chip = running_at(0, 0, 0);
        chip.write_register(CONTROL, OUT);
        assert!(chip.sqw_level());
        chip.write_register(CONTROL, 0);
        assert!(!chip.sqw_level());
    }

    #[test]
    fn test_ram_is_plain_storage() {
        let mut chip = Ds1307::new();
        chip.write_register(RAM_START + 3, 0xA5);
        assert_eq!(chip.read_register(RAM_START + 3), 0xA5);
    }
}
