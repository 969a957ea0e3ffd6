//! Board wiring profiles.
//!
//! The RTC's SQW pin is wired to the external clock input of a 16-bit timer.
//! Which timer, which pin and which edge is fixed per board and chosen when
//! the crate is built (`board-mega` feature), never at runtime.
//!
//! The two profiles count opposite edges. The RTC increments its seconds
//! register on the falling edge of SQW, so the Uno profile interrupts right
//! at the rollover while the Mega profile interrupts half a second later.

use serde::{Deserialize, Serialize};

/// Data-space address of UCSR0A; UDR0 sits at +6.
pub const UART0_BASE: u16 = 0xC0;

/// An 8-bit GPIO port. `base` is the address of PINx; DDRx and PORTx follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub name: char,
    pub base: u16,
}

impl Port {
    pub const fn ddr(&self) -> u16 {
        self.base + 1
    }

    pub const fn port(&self) -> u16 {
        self.base + 2
    }
}

pub const PORT_B: Port = Port {
    name: 'B',
    base: 0x23,
};
pub const PORT_D: Port = Port {
    name: 'D',
    base: 0x29,
};
pub const PORT_L: Port = Port {
    name: 'L',
    base: 0x109,
};

/// A digital pin by its Arduino number and the port bit behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub number: u8,
    pub port: Port,
    pub bit: u8,
}

impl Pin {
    pub const fn mask(&self) -> u8 {
        1 << self.bit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Falling,
    Rising,
}

impl Edge {
    /// CSn2:0 value selecting the external Tn pin on this edge.
    pub const fn clock_select(self) -> u8 {
        match self {
            Edge::Falling => 0b110,
            Edge::Rising => 0b111,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerProfile {
    pub board: &'static str,
    /// Timer unit number (the `n` in TCCRnA).
    pub timer: u8,
    /// Address of TCCRnA.
    pub base: u16,
    pub edge: Edge,
    /// External clock input Tn, wired to the RTC's SQW output.
    pub clock_pin: Pin,
    pub indicator_pin: Pin,
    /// TIMERn_COMPA vector number.
    pub compare_vector: u8,
    /// SQW edges counted between two compare-match interrupts.
    pub edges_per_interrupt: u16,
}

impl TimerProfile {
    /// OCRnA value for the configured divisor. The timer clears on the
    /// edge after reaching OCRnA, hence the minus one.
    pub const fn compare_value(&self) -> u16 {
        self.edges_per_interrupt - 1
    }
}

pub trait Variant {
    const PROFILE: TimerProfile;
}

/// Arduino Uno (ATmega328P): Timer1 clocked from T1 on D5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uno;

impl Variant for Uno {
    const PROFILE: TimerProfile = TimerProfile {
        board: "uno",
        timer: 1,
        base: 0x80,
        edge: Edge::Falling,
        clock_pin: Pin {
            number: 5,
            port: PORT_D,
            bit: 5,
        },
        indicator_pin: Pin {
            number: 13,
            port: PORT_B,
            bit: 5,
        },
        compare_vector: 11,
        edges_per_interrupt: 1,
    };
}

/// Arduino Mega 2560: Timer5 clocked from T5 on D47.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mega;

impl Variant for Mega {
    const PROFILE: TimerProfile = TimerProfile {
        board: "mega",
        timer: 5,
        base: 0x120,
        edge: Edge::Rising,
        clock_pin: Pin {
            number: 47,
            port: PORT_L,
            bit: 2,
        },
        indicator_pin: Pin {
            number: 13,
            port: PORT_B,
            bit: 7,
        },
        compare_vector: 46,
        edges_per_interrupt: 1,
    };
}

#[cfg(not(feature = "board-mega"))]
pub type ActiveVariant = Uno;

#[cfg(feature = "board-mega")]
pub type ActiveVariant = Mega;
