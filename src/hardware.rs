use crate::clock::{Clock, Clocked};
use crate::error::GbError;
use crate::lr35902::timer::Timer;
use crate::memory::mapper::Mapper;
use crate::memory::mmu::Mmu;
use crate::video::ppu::Ppu;

/// Everything the CPU talks to: the shared clock, the address space and the PPU.
///
/// Components never hold references to each other. Scheduled callbacks and
/// write observers receive the whole `Hardware` instead, so any number of
/// independent machines can coexist.
pub struct Hardware {
    pub clock: Clock<Hardware>,
    pub mmu: Mmu,
    pub ppu: Ppu,
}

impl Clocked for Hardware {
    #[inline]
    fn clock(&mut self) -> &mut Clock<Hardware> {
        &mut self.clock
    }
}

impl Hardware {
    /// Powers on the machine. The timers and the PPU schedule their first
    /// events right away and keep rescheduling themselves from then on.
    pub fn new(cartridge: Box<dyn Mapper>) -> Hardware {
        let mut hardware = Hardware {
            clock: Clock::new(),
            mmu: Mmu::new(cartridge),
            ppu: Ppu::new(),
        };

        Timer::install(&mut hardware);
        Ppu::install(&mut hardware);

        hardware
    }

    #[inline]
    pub fn read(&self, addr: u16) -> Result<u8, GbError> {
        self.mmu.read(addr)
    }

    /// Writes through the MMU and then notifies every observer of `addr`, in
    /// registration order.
    pub fn write(&mut self, addr: u16, data: u8) -> Result<(), GbError> {
        self.mmu.write(addr, data)?;

        for watcher in self.mmu.watchers(addr) {
            watcher(self, data)?;
        }

        Ok(())
    }

    pub fn read16(&self, addr: u16) -> Result<u16, GbError> {
        self.mmu.read16(addr)
    }

    pub fn write16(&mut self, addr: u16, data: u16) -> Result<(), GbError> {
        let [lo, hi] = data.to_le_bytes();
        self.write(addr, lo)?;
        self.write(addr.wrapping_add(1), hi)?;
        Ok(())
    }

    pub fn watch<F>(&mut self, addr: u16, callback: F)
    where
        F: Fn(&mut Hardware, u8) -> Result<(), GbError> + 'static,
    {
        self.mmu.watch(addr, callback);
    }

    /// Lets `cycles` of machine time pass, running whatever falls due.
    #[inline]
    pub fn advance(&mut self, cycles: u64) -> Result<(), GbError> {
        Clock::advance(self, cycles)
    }
}
