use crate::peripherals::ds1307;
use crate::peripherals::timer::TimerRegisters;
use crate::variant::{Edge, Variant};
use crate::Board;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct BoardSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub board: String,
    pub edge: Edge,
    pub now_ms: u32,
    pub interrupts_enabled: bool,
    pub sketch: SketchSnapshot,
    pub rtc: RtcSnapshot,
    pub timer: Option<TimerRegisters>,
    pub uart_lines: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SketchSnapshot {
    pub flag: bool,
    pub indicator: bool,
    pub last_poll_ms: u32,
    pub ticks: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RtcSnapshot {
    pub time: String,
    pub halted: bool,
    pub sqw_level: bool,
    /// Timekeeping and control registers, 0x00..=0x07.
    pub registers: Vec<u8>,
}

impl BoardSnapshot {
    pub fn capture<V: Variant>(board: &Board<V>) -> Self {
        let mut driver = board.rtc_driver.clone();
        driver.refresh(&board.rtc);

        Self {
            kind: "sqwclock_board".to_string(),
            board: V::PROFILE.board.to_string(),
            edge: V::PROFILE.edge,
            now_ms: board.now_ms(),
            interrupts_enabled: board.interrupts_enabled(),
            sketch: SketchSnapshot {
                flag: board.flag().is_set(),
                indicator: board.sketch.indicator(),
                last_poll_ms: board.sketch.last_poll_ms(),
                ticks: board.sketch.ticks(),
            },
            rtc: RtcSnapshot {
                time: driver.now().to_string(),
                halted: board.rtc.is_halted(),
                sqw_level: board.rtc.sqw_level(),
                registers: board.rtc.registers()[..=ds1307::CONTROL as usize].to_vec(),
            },
            timer: board.timer().map(|t| t.registers()),
            uart_lines: board
                .uart()
                .map(|u| u.lines().to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
