use crate::hal::InterruptControl;
use crate::peripherals::timer::{self, Tccrb, Timsk};
use crate::variant::TimerProfile;
use crate::{Bus, SimResult};

/// Put the profile's timer in CTC mode, clocked by external edges on its Tn
/// pin, with the compare-match A interrupt enabled.
///
/// Runs with interrupts globally disabled. They are enabled again once the
/// registers are written, even if they were off on entry.
pub fn configure_timer<H>(profile: &TimerProfile, hw: &mut H) -> SimResult<()>
where
    H: Bus + InterruptControl,
{
    let base = profile.base as u64;

    hw.disable();

    hw.write_u8(base + timer::TCCRA, 0)?;
    hw.write_u8(base + timer::TCCRB, 0)?;
    hw.write_u16(base + timer::TCNTL, 0)?;
    hw.write_u16(base + timer::OCRAL, profile.compare_value())?;

    let tccrb = Tccrb::WGM12.bits() | profile.edge.clock_select();
    hw.write_u8(base + timer::TCCRB, tccrb)?;

    let timsk = hw.read_u8(base + timer::TIMSK)?;
    hw.write_u8(base + timer::TIMSK, timsk | Timsk::OCIEA.bits())?;

    hw.enable();

    tracing::info!(
        "Timer{} on {}: CTC, {:?} edge on D{}, OCR{}A={}, vector {}",
        profile.timer,
        profile.board,
        profile.edge,
        profile.clock_pin.number,
        profile.timer,
        profile.compare_value(),
        profile.compare_vector
    );

    Ok(())
}
