use crate::error::GbError;
use crate::memory::mapper::{banked_rom_offset, Mapper};
use crate::memory::{EXTERNAL_RAM_BANK_SIZE, EXTERNAL_RAM_END, EXTERNAL_RAM_START};
use log::{debug, warn};

const RAM_BANKS: usize = 4;
const DAY_HIGH_BIT: u8 = 0b0000_0001;
const HALT_BIT: u8 = 0b0100_0000;
const DAY_CARRY_BIT: u8 = 0b1000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcRegister {
    Seconds,
    Minutes,
    Hours,
    DaysLow,
    DaysHigh,
}

impl RtcRegister {
    pub fn slot(&self) -> u8 {
        match self {
            RtcRegister::Seconds => 0,
            RtcRegister::Minutes => 1,
            RtcRegister::Hours => 2,
            RtcRegister::DaysLow => 3,
            RtcRegister::DaysHigh => 4,
        }
    }
}

/// What the `0xa000..=0xbfff` window currently maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamSelection {
    Bank(u8),
    Clock(RtcRegister),
}

impl RamSelection {
    fn from_code(code: u8) -> Result<RamSelection, GbError> {
        match code {
            0x00..=0x03 => Ok(RamSelection::Bank(code)),
            0x08 => Ok(RamSelection::Clock(RtcRegister::Seconds)),
            0x09 => Ok(RamSelection::Clock(RtcRegister::Minutes)),
            0x0a => Ok(RamSelection::Clock(RtcRegister::Hours)),
            0x0b => Ok(RamSelection::Clock(RtcRegister::DaysLow)),
            0x0c => Ok(RamSelection::Clock(RtcRegister::DaysHigh)),
            _ => Err(GbError::InvalidRamBank { bank: code }),
        }
    }

    fn code(&self) -> u8 {
        match self {
            RamSelection::Bank(bank) => *bank,
            RamSelection::Clock(register) => 0x08 + register.slot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days_low: u8,
    pub days_high: u8,
}

impl RtcRegisters {
    pub fn get(&self, register: RtcRegister) -> u8 {
        match register {
            RtcRegister::Seconds => self.seconds & 0x3f,
            RtcRegister::Minutes => self.minutes & 0x3f,
            RtcRegister::Hours => self.hours & 0x1f,
            RtcRegister::DaysLow => self.days_low,
            RtcRegister::DaysHigh => self.days_high & (DAY_HIGH_BIT | HALT_BIT | DAY_CARRY_BIT),
        }
    }

    pub fn set(&mut self, register: RtcRegister, data: u8) {
        match register {
            RtcRegister::Seconds => self.seconds = data & 0x3f,
            RtcRegister::Minutes => self.minutes = data & 0x3f,
            RtcRegister::Hours => self.hours = data & 0x1f,
            RtcRegister::DaysLow => self.days_low = data,
            RtcRegister::DaysHigh => self.days_high = data & (DAY_HIGH_BIT | HALT_BIT | DAY_CARRY_BIT),
        }
    }

    pub fn days(&self) -> u16 {
        (((self.days_high & DAY_HIGH_BIT) as u16) << 8) | self.days_low as u16
    }

    fn tick(&mut self) {
        if self.days_high & HALT_BIT != 0 {
            return;
        }

        self.seconds = (self.seconds + 1) & 0x3f;
        if self.seconds != 60 {
            return;
        }
        self.seconds = 0;

        self.minutes = (self.minutes + 1) & 0x3f;
        if self.minutes != 60 {
            return;
        }
        self.minutes = 0;

        self.hours = (self.hours + 1) & 0x1f;
        if self.hours != 24 {
            return;
        }
        self.hours = 0;

        let days = self.days() + 1;
        if days > 0x1ff {
            self.days_low = 0;
            self.days_high = (self.days_high & !DAY_HIGH_BIT) | DAY_CARRY_BIT;
        } else {
            self.days_low = days as u8;
            self.days_high = (self.days_high & !DAY_HIGH_BIT) | (days >> 8) as u8;
        }
    }
}

pub struct Mbc3 {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_bank: u8,
    selection: RamSelection,
    ram_enabled: bool,
    clock: RtcRegisters,
    latched: RtcRegisters,
    latch_pending: bool,
}

impl Mbc3 {
    pub fn new(memory: Vec<u8>) -> Mbc3 {
        Mbc3 {
            rom: memory,
            ram: vec![0; RAM_BANKS * EXTERNAL_RAM_BANK_SIZE],
            rom_bank: 1,
            selection: RamSelection::Bank(0),
            ram_enabled: false,
            clock: RtcRegisters::default(),
            latched: RtcRegisters::default(),
            latch_pending: false,
        }
    }

    pub fn selection(&self) -> RamSelection {
        self.selection
    }

    pub fn clock(&self) -> &RtcRegisters {
        &self.clock
    }

    pub fn latched_clock(&self) -> &RtcRegisters {
        &self.latched
    }

    #[inline]
    fn ram_offset(bank: u8, addr: u16) -> usize {
        bank as usize * EXTERNAL_RAM_BANK_SIZE + (addr - EXTERNAL_RAM_START) as usize
    }
}

impl Mapper for Mbc3 {
    #[inline]
    fn read(&self, addr: u16) -> Result<u8, GbError> {
        match addr {
            0x0000..=0x3fff => Ok(self.rom[addr as usize]),
            0x4000..=0x7fff => {
                let offset = banked_rom_offset(self.rom.len(), self.rom_bank as u16, addr);
                self.rom
                    .get(offset)
                    .copied()
                    .ok_or(GbError::OutOfBoundsMemoryAccess { address: addr })
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                if !self.ram_enabled {
                    warn!("MBC3: Read from disabled external RAM at {:04x}", addr);
                    return Ok(0xff);
                }

                match self.selection {
                    RamSelection::Bank(bank) => Ok(self.ram[Mbc3::ram_offset(bank, addr)]),
                    RamSelection::Clock(register) => Ok(self.latched.get(register)),
                }
            }
            _ => Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8) -> Result<(), GbError> {
        match addr {
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                if !self.ram_enabled {
                    warn!("MBC3: Dropped write of {:02x} to disabled external RAM at {:04x}", data, addr);
                    return Ok(());
                }

                match self.selection {
                    RamSelection::Bank(bank) => self.ram[Mbc3::ram_offset(bank, addr)] = data,
                    RamSelection::Clock(register) => self.clock.set(register, data),
                }
                Ok(())
            }
            _ => Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }
    }

    fn enable_ram(&mut self, data: u8) {
        self.ram_enabled = data & 0x0f == 0x0a;
        debug!("MBC3: RAM enabled: {}", self.ram_enabled);
    }

    fn select_rom_bank(&mut self, data: u8) {
        // 7 bits wide, bank 0 can't be mapped into the switchable window.
        self.rom_bank = data & 0b0111_1111;
        if self.rom_bank == 0 {
            self.rom_bank = 1;
        }
        debug!("MBC3: Switched to ROM bank {}", self.rom_bank);
    }

    fn select_ram_bank(&mut self, data: u8) -> Result<(), GbError> {
        self.selection = RamSelection::from_code(data)?;
        debug!("MBC3: Switched external RAM window to {:?}", self.selection);
        Ok(())
    }

    fn latch_clock_data(&mut self, data: u8) {
        match data {
            0x00 => self.latch_pending = true,
            0x01 if self.latch_pending => {
                self.latched = self.clock;
                self.latch_pending = false;
                debug!("MBC3: Latched clock {:?}", self.latched);
            }
            _ => self.latch_pending = false,
        }
    }

    fn tick_clock(&mut self) {
        self.clock.tick();
    }

    #[inline]
    fn current_rom_bank(&self) -> u16 {
        self.rom_bank as u16
    }

    #[inline]
    fn current_ram_bank(&self) -> u8 {
        self.selection.code()
    }

    #[inline]
    fn name(&self) -> String {
        String::from("MBC3")
    }
}
