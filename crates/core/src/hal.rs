//! Capabilities the sketch needs from the board. The sketch treats every
//! call as infallible.

use crate::variant::Pin;

/// Real-time clock driver.
pub trait RtcDriver {
    /// Enable the square-wave output at 1 Hz.
    fn enable_square_wave_1hz(&mut self);
    /// Read the current time from the chip into local state.
    fn refresh(&mut self);
    /// Seconds field of the last `refresh`.
    fn seconds(&self) -> u8;

    fn is_running(&self) -> bool {
        true
    }

    /// Restart a halted oscillator, keeping the stored time.
    fn start_oscillator(&mut self) {}
}

pub trait SerialOut {
    fn write_line(&mut self, line: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

pub trait DigitalIo {
    fn set_direction(&mut self, pin: Pin, direction: Direction);
    fn set_level(&mut self, pin: Pin, level: Level);
}

/// Monotonic millisecond clock; wraps at `u32::MAX`.
pub trait Millis {
    fn millis(&self) -> u32;
}

/// Global interrupt enable (the I bit in SREG).
pub trait InterruptControl {
    fn disable(&mut self);
    fn enable(&mut self);
    fn enabled(&self) -> bool;
}

/// Everything the polling loop touches.
pub trait Hal: RtcDriver + SerialOut + DigitalIo + Millis {}

impl<T: RtcDriver + SerialOut + DigitalIo + Millis> Hal for T {}
