use crate::flag::TickFlag;
use crate::hal::{Direction, Hal, InterruptControl, Level};
use crate::setup::configure_timer;
use crate::variant::{ActiveVariant, Variant};
use crate::{Bus, SimResult};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Minimum gap between two periodic clock reads. The periodic branch fires
/// once strictly more than this has elapsed.
pub const POLL_INTERVAL_MS: u32 = 200;

pub const BANNER: &str = "RTC SQW 1Hz timer demo";

/// TIMERn_COMPA handler.
pub fn compare_match_isr(flag: &TickFlag) {
    flag.set();
}

/// What one loop iteration printed, as seconds readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub tick: Option<u8>,
    pub periodic: Option<u8>,
}

/// The demo program: one-time setup plus the polling loop body.
#[derive(Debug)]
pub struct Sketch<V: Variant = ActiveVariant> {
    flag: Arc<TickFlag>,
    indicator: bool,
    last_poll_ms: u32,
    ticks: u64,
    _variant: PhantomData<V>,
}

impl<V: Variant> Sketch<V> {
    pub fn new(flag: Arc<TickFlag>) -> Self {
        Self {
            flag,
            indicator: false,
            last_poll_ms: 0,
            ticks: 0,
            _variant: PhantomData,
        }
    }

    pub fn flag(&self) -> &Arc<TickFlag> {
        &self.flag
    }

    pub fn indicator(&self) -> bool {
        self.indicator
    }

    pub fn last_poll_ms(&self) -> u32 {
        self.last_poll_ms
    }

    /// Flag events handled so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn setup<H>(&mut self, hw: &mut H) -> SimResult<()>
    where
        H: Hal + Bus + InterruptControl,
    {
        let profile = V::PROFILE;

        hw.write_line(BANNER);

        hw.set_direction(profile.indicator_pin, Direction::Output);
        hw.set_level(profile.indicator_pin, Level::Low);
        hw.set_direction(profile.clock_pin, Direction::Input);

        if !hw.is_running() {
            hw.write_line("RTC is NOT running, starting oscillator");
            hw.start_oscillator();
        }
        hw.enable_square_wave_1hz();

        configure_timer(&profile, hw)
    }

    /// One iteration of the main loop.
    pub fn poll<H: Hal>(&mut self, hw: &mut H) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        if self.flag.take() {
            self.indicator = !self.indicator;
            self.ticks += 1;
            hw.set_level(V::PROFILE.indicator_pin, self.indicator.into());
            hw.refresh();
            let seconds = hw.seconds();
            hw.write_line(&format!(
                "SQW tick: LED {}, seconds = {}",
                if self.indicator { "on" } else { "off" },
                seconds
            ));
            outcome.tick = Some(seconds);
        }

        let now = hw.millis();
        if now.wrapping_sub(self.last_poll_ms) > POLL_INTERVAL_MS {
            self.last_poll_ms = now;
            hw.refresh();
            let seconds = hw.seconds();
            hw.write_line(&format!("seconds = {}", seconds));
            outcome.periodic = Some(seconds);
        }

        outcome
    }
}
