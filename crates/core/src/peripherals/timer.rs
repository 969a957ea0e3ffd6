use crate::SimResult;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::any::Any;

pub const TCCRA: u64 = 0x00;
pub const TCCRB: u64 = 0x01;
pub const TCCRC: u64 = 0x02;
pub const TCNTL: u64 = 0x04;
pub const TCNTH: u64 = 0x05;
pub const OCRAL: u64 = 0x08;
pub const OCRAH: u64 = 0x09;
// On silicon TIMSKn and TIFRn live outside the timer block; the simulated
// window folds them in at the end.
pub const TIMSK: u64 = 0x0E;
pub const TIFR: u64 = 0x0F;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tccrb: u8 {
        const WGM13 = 1 << 4;
        const WGM12 = 1 << 3;
        const CS2 = 1 << 2;
        const CS1 = 1 << 1;
        const CS0 = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Timsk: u8 {
        const OCIEA = 1 << 1;
        const TOIE = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tifr: u8 {
        const OCFA = 1 << 1;
        const TOV = 1 << 0;
    }
}

const CS_MASK: u8 = 0b111;
const CS_EXT_FALLING: u8 = 0b110;
const CS_EXT_RISING: u8 = 0b111;

/// Register values, as captured in board snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRegisters {
    pub tccra: u8,
    pub tccrb: u8,
    pub tccrc: u8,
    pub tcnt: u16,
    pub ocra: u16,
    pub timsk: u8,
    pub tifr: u8,
}

/// 16-bit AVR timer/counter, modelled for external clocking.
///
/// Only the Tn pin sources (CSn2:0 = 0b110 / 0b111) advance the counter.
/// Prescaled system-clock sources run far below the millisecond resolution
/// of the board simulation and leave the counter untouched.
#[derive(Debug, Default)]
pub struct CompareTimer {
    regs: TimerRegisters,
    /// Last sampled level of the Tn pin.
    input_level: bool,
}

impl CompareTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> TimerRegisters {
        self.regs
    }

    fn ctc(&self) -> bool {
        let wgm_low = self.regs.tccra & 0b11;
        let wgm_high = Tccrb::from_bits_truncate(self.regs.tccrb) & (Tccrb::WGM13 | Tccrb::WGM12);
        wgm_low == 0 && wgm_high == Tccrb::WGM12
    }

    /// Sample the Tn pin. Returns true when this sample produced a compare
    /// match.
    pub fn clock_input(&mut self, level: bool) -> bool {
        let previous = std::mem::replace(&mut self.input_level, level);
        let counts = match self.regs.tccrb & CS_MASK {
            CS_EXT_FALLING => previous && !level,
            CS_EXT_RISING => !previous && level,
            _ => false,
        };
        if !counts {
            return false;
        }

        let ctc = self.ctc();
        let regs = &mut self.regs;
        if ctc && regs.tcnt == regs.ocra {
            regs.tcnt = 0;
        } else {
            let (next, overflow) = regs.tcnt.overflowing_add(1);
            regs.tcnt = next;
            if overflow {
                regs.tifr |= Tifr::TOV.bits();
            }
        }

        if regs.tcnt == regs.ocra {
            regs.tifr |= Tifr::OCFA.bits();
            return true;
        }
        false
    }

    /// Compare-match interrupt requested and enabled.
    pub fn irq_pending(&self) -> bool {
        let flags = Tifr::from_bits_truncate(self.regs.tifr);
        let mask = Timsk::from_bits_truncate(self.regs.timsk);
        flags.contains(Tifr::OCFA) && mask.contains(Timsk::OCIEA)
    }

    /// Entering the vector clears OCFA in hardware.
    pub fn acknowledge(&mut self) {
        self.regs.tifr &= !Tifr::OCFA.bits();
    }
}

impl crate::Peripheral for CompareTimer {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let r = &self.regs;
        Ok(match offset {
            TCCRA => r.tccra,
            TCCRB => r.tccrb,
            TCCRC => r.tccrc,
            TCNTL => (r.tcnt & 0xFF) as u8,
            TCNTH => (r.tcnt >> 8) as u8,
            OCRAL => (r.ocra & 0xFF) as u8,
            OCRAH => (r.ocra >> 8) as u8,
            TIMSK => r.timsk,
            TIFR => r.tifr,
            _ => 0,
        })
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let r = &mut self.regs;
        match offset {
            TCCRA => r.tccra = value,
            TCCRB => r.tccrb = value,
            // FOCnx strobes are not modelled
            TCCRC => {}
            TCNTL => r.tcnt = (r.tcnt & 0xFF00) | value as u16,
            TCNTH => r.tcnt = (r.tcnt & 0x00FF) | ((value as u16) << 8),
            OCRAL => r.ocra = (r.ocra & 0xFF00) | value as u16,
            OCRAH => r.ocra = (r.ocra & 0x00FF) | ((value as u16) << 8),
            TIMSK => r.timsk = value,
            // Flags are cleared by writing a one
            TIFR => r.tifr &= !value,
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
