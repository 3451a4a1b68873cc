use crate::error::GbError;
use crate::hardware::Hardware;
use crate::lr35902::irq::Interrupt;
use crate::lr35902::T_CYCLES_PER_SECOND;
use crate::memory::registers::TimerControl;
use crate::memory::{DIV_REGISTER, TAC_REGISTER, TIMA_REGISTER, TMA_REGISTER};
use log::trace;

pub const DIVIDER_CYCLES: u64 = 256;

/// DIV and TIMA. Neither is polled; each tick schedules the next one on the clock.
pub struct Timer {}

impl Timer {
    pub fn install(hw: &mut Hardware) {
        hw.clock.schedule(DIVIDER_CYCLES, Timer::tick_divider);
        // TAC holds a valid code at power-on, the fallback is never used
        let period = Timer::period(hw.mmu.read_io(TAC_REGISTER)).unwrap_or(1024);
        hw.clock.schedule(period, Timer::tick_counter);
        hw.clock.schedule(T_CYCLES_PER_SECOND, Timer::tick_cartridge_clock);
    }

    /// Cycles between two TIMA increments for the frequency selected in TAC.
    pub fn period(tac: u8) -> Result<u64, GbError> {
        match tac & TimerControl::FREQUENCY.bits() {
            0b00 => Ok(1024),
            0b01 => Ok(16),
            0b10 => Ok(64),
            0b11 => Ok(256),
            _ => Err(GbError::InvalidTimerFrequency { tac }),
        }
    }

    fn tick_divider(hw: &mut Hardware) -> Result<(), GbError> {
        let div = hw.mmu.read_io(DIV_REGISTER);
        hw.mmu.write_io(DIV_REGISTER, div.wrapping_add(1));

        hw.clock.schedule(DIVIDER_CYCLES, Timer::tick_divider);
        Ok(())
    }

    fn tick_counter(hw: &mut Hardware) -> Result<(), GbError> {
        let tac = hw.mmu.read_io(TAC_REGISTER);

        if TimerControl::from(tac).contains(TimerControl::ENABLE) {
            let tima = hw.mmu.read_io(TIMA_REGISTER);
            if tima == 0xff {
                let tma = hw.mmu.read_io(TMA_REGISTER);
                trace!("TIMA overflow, reloading {:02x}", tma);
                hw.mmu.write_io(TIMA_REGISTER, tma);
                hw.mmu.request_interrupt(Interrupt::Timer);
            } else {
                hw.mmu.write_io(TIMA_REGISTER, tima + 1);
            }
        }

        // Frequency changes only apply from the next tick on
        hw.clock.schedule(Timer::period(tac)?, Timer::tick_counter);
        Ok(())
    }

    fn tick_cartridge_clock(hw: &mut Hardware) -> Result<(), GbError> {
        hw.mmu.tick_cartridge_clock();
        hw.clock.schedule(T_CYCLES_PER_SECOND, Timer::tick_cartridge_clock);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::tests::hardware;
    use crate::memory::mapper::mbc3::Mbc3;
    use crate::memory::INTERRUPT_FLAGS_REGISTER;

    fn timer_requested(hw: &Hardware) -> bool {
        hw.mmu.interrupt_info()[2].requested
    }

    #[test]
    fn divider_counts_every_256_cycles_and_wraps() {
        let mut hw = hardware();
        hw.advance(255).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 0);
        hw.advance(2).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 1);

        hw.advance(256 * 255).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 0);
    }

    #[test]
    fn divider_write_resets_but_keeps_counting() {
        let mut hw = hardware();
        hw.advance(256 * 10 + 1).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 10);

        hw.write(DIV_REGISTER, 0x5a).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 0);

        hw.advance(256).unwrap();
        assert_eq!(hw.read(DIV_REGISTER).unwrap(), 1);
    }

    #[test]
    fn disabled_timer_does_not_count() {
        let mut hw = hardware();
        hw.advance(1024 * 4 + 1).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 0);
    }

    #[test]
    fn overflow_reloads_modulo_and_requests_interrupt() {
        let mut hw = hardware();
        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        hw.write(TMA_REGISTER, 0xf0).unwrap();
        hw.write(TIMA_REGISTER, 0xfe).unwrap();
        // Enabled, 1024 cycles; the first tick was scheduled at power-on for 1024
        hw.write(TAC_REGISTER, 0b100).unwrap();

        hw.advance(1025).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 0xff);
        assert!(!timer_requested(&hw));

        hw.advance(1024).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 0xf0);
        assert!(timer_requested(&hw));
    }

    #[test]
    fn frequency_change_applies_on_next_tick() {
        let mut hw = hardware();
        hw.write(TAC_REGISTER, 0b101).unwrap();

        // The pending tick still fires at 1024, the ones after it every 16 cycles
        hw.advance(1000).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 0);
        hw.advance(25).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 1);
        hw.advance(16 * 4).unwrap();
        assert_eq!(hw.read(TIMA_REGISTER).unwrap(), 5);
    }

    #[test]
    fn cartridge_clock_counts_emulated_seconds() {
        let mut hw = Hardware::new(Box::new(Mbc3::new(vec![0u8; 0x8000])));
        hw.write(0x0000, 0x0a).unwrap();
        hw.write(0x4000, 0x08).unwrap();

        let latched_seconds = |hw: &mut Hardware| {
            hw.write(0x6000, 0x00).unwrap();
            hw.write(0x6000, 0x01).unwrap();
            hw.read(0xa000).unwrap()
        };

        hw.advance(T_CYCLES_PER_SECOND - 1).unwrap();
        assert_eq!(latched_seconds(&mut hw), 0);

        hw.advance(2 * T_CYCLES_PER_SECOND + 2).unwrap();
        assert_eq!(latched_seconds(&mut hw), 3);
    }

    #[test]
    fn periods_follow_tac_codes() {
        assert_eq!(Timer::period(0b100).unwrap(), 1024);
        assert_eq!(Timer::period(0b101).unwrap(), 16);
        assert_eq!(Timer::period(0b110).unwrap(), 64);
        assert_eq!(Timer::period(0xff).unwrap(), 256);
    }
}
