use crate::error::GbError;
use crate::hardware::Hardware;
use crate::joypad::Joypad;
use crate::lr35902::irq::{Interrupt, InterruptInfo};
use crate::memory::mapper::Mapper;
use crate::memory::registers::InterruptFlags;
use crate::memory::*;
use crate::video::cram::Cram;
use crate::video::{LCD_CONTROL_REGISTER, LCD_STATUS_REGISTER, SCANLINE_Y_REGISTER};
use log::{trace, warn};
use std::collections::HashMap;
use std::rc::Rc;

/// Called after a write to the watched address went through, with the written byte.
pub type Watcher = Rc<dyn Fn(&mut Hardware, u8) -> Result<(), GbError>>;

const IO_POWER_ON: [(u16, u8); 10] = [
    (JOYPAD_REGISTER, 0xcf),
    (TAC_REGISTER, 0xf8),
    (INTERRUPT_FLAGS_REGISTER, 0xe1),
    (LCD_CONTROL_REGISTER, 0x91),
    (LCD_STATUS_REGISTER, 0x85),
    (crate::video::BG_PALETTE_REGISTER, 0xfc),
    (crate::video::OBJ0_PALETTE_REGISTER, 0xff),
    (crate::video::OBJ1_PALETTE_REGISTER, 0xff),
    (WRAM_BANK_REGISTER, 0x01),
    (INTERRUPT_ENABLE_REGISTER, 0x00),
];

pub struct Mmu {
    cartridge: Box<dyn Mapper>,
    vram: Vec<u8>,
    wram: Vec<u8>,
    oam: Vec<u8>,
    io: [u8; 0x100],
    pub cram: Cram,
    pub joypad: Joypad,
    watchers: HashMap<u16, Vec<Watcher>>,
}

impl Mmu {
    pub fn new(cartridge: Box<dyn Mapper>) -> Mmu {
        let mut io = [0; 0x100];
        for (addr, value) in IO_POWER_ON {
            io[(addr & 0xff) as usize] = value;
        }

        Mmu {
            cartridge,
            vram: vec![0; 2 * VRAM_BANK_SIZE],
            wram: vec![0; 8 * WRAM_BANK_SIZE],
            oam: vec![0; (OAM_END - OAM_START + 1) as usize],
            io,
            cram: Cram::new(),
            joypad: Joypad::new(),
            watchers: HashMap::new(),
        }
    }

    pub fn read(&self, addr: u16) -> Result<u8, GbError> {
        match addr {
            0x0000..=0x7fff => self.cartridge.read(addr),
            VRAM_START..=VRAM_END => Ok(self.vram[self.vram_offset(self.vram_bank(), addr)]),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.read(addr),
            0xc000..=0xdfff => Ok(self.wram[self.wram_offset(addr)]),
            0xe000..=0xfdff => self.read(addr - 0x2000),
            OAM_START..=OAM_END => Ok(self.oam[(addr - OAM_START) as usize]),
            JOYPAD_REGISTER => Ok(self.joypad.as_u8(self.read_io(JOYPAD_REGISTER))),
            BACKGROUND_PALETTE_INDEX_REGISTER => Ok(self.cram.background.read_index()),
            BACKGROUND_PALETTE_DATA_REGISTER => Ok(self.cram.background.read_data()),
            OBJECT_PALETTE_INDEX_REGISTER => Ok(self.cram.object.read_index()),
            OBJECT_PALETTE_DATA_REGISTER => Ok(self.cram.object.read_data()),
            0xff00..=0xffff => Ok(self.read_io(addr)),
            _ => Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }
    }

    /// Stores `data` with the access rules the CPU is subject to. Observers are
    /// notified by [`Hardware::write`], which is the entry point everything
    /// outside the MMU goes through.
    pub fn write(&mut self, addr: u16, data: u8) -> Result<(), GbError> {
        match addr {
            0x0000..=0x1fff => self.cartridge.enable_ram(data),
            0x2000..=0x3fff => self.cartridge.select_rom_bank(data),
            0x4000..=0x5fff => self.cartridge.select_ram_bank(data)?,
            0x6000..=0x7fff => self.cartridge.latch_clock_data(data),
            VRAM_START..=VRAM_END => {
                let offset = self.vram_offset(self.vram_bank(), addr);
                self.vram[offset] = data;
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.cartridge.write(addr, data)?,
            0xc000..=0xdfff => {
                let offset = self.wram_offset(addr);
                self.wram[offset] = data;
            }
            0xe000..=0xfdff => self.write(addr - 0x2000, data)?,
            OAM_START..=OAM_END => self.oam[(addr - OAM_START) as usize] = data,
            JOYPAD_REGISTER => {
                let select = data & 0b0011_0000;
                if select == 0 {
                    warn!("Joypad has buttons and d-pad mode selected");
                }
                self.write_io(JOYPAD_REGISTER, (self.read_io(JOYPAD_REGISTER) & !0b0011_0000) | select);
            }
            // Any write resets the divider, regardless of the value
            DIV_REGISTER => self.write_io(DIV_REGISTER, 0),
            LCD_STATUS_REGISTER => {
                let status = (data & 0b0111_1000) | (self.read_io(LCD_STATUS_REGISTER) & 0b0000_0111);
                self.write_io(LCD_STATUS_REGISTER, 0b1000_0000 | status);
            }
            // Unused upper bits always read back set
            INTERRUPT_FLAGS_REGISTER => self.write_io(INTERRUPT_FLAGS_REGISTER, 0b1110_0000 | data),
            SCANLINE_Y_REGISTER => warn!("Dropped write of {:02x} to read-only LY", data),
            BACKGROUND_PALETTE_INDEX_REGISTER => self.cram.background.write_index(data),
            BACKGROUND_PALETTE_DATA_REGISTER => self.cram.background.write_data(data),
            OBJECT_PALETTE_INDEX_REGISTER => self.cram.object.write_index(data),
            OBJECT_PALETTE_DATA_REGISTER => self.cram.object.write_data(data),
            0xff00..=0xffff => self.write_io(addr, data),
            _ => return Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }

        Ok(())
    }

    pub fn read16(&self, addr: u16) -> Result<u16, GbError> {
        let lo = self.read(addr)? as u16;
        let hi = self.read(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    /// Raw access to the `0xff00..=0xffff` block, bypassing CPU side effects.
    /// Used by the hardware that owns those registers.
    #[inline]
    pub fn read_io(&self, addr: u16) -> u8 {
        self.io[(addr & 0xff) as usize]
    }

    #[inline]
    pub fn write_io(&mut self, addr: u16, data: u8) {
        self.io[(addr & 0xff) as usize] = data;
    }

    pub fn read_as_io<T>(&self, addr: u16) -> T
    where
        T: From<u8>,
    {
        T::from(self.read_io(addr))
    }

    /// Reads VRAM from an explicit bank, ignoring the bank select register.
    #[inline]
    pub fn read_from_vram(&self, addr: u16, bank: u8) -> u8 {
        self.vram[self.vram_offset(bank, addr)]
    }

    pub fn watch<F>(&mut self, addr: u16, callback: F)
    where
        F: Fn(&mut Hardware, u8) -> Result<(), GbError> + 'static,
    {
        self.watchers.entry(addr).or_default().push(Rc::new(callback));
    }

    pub fn watchers(&self, addr: u16) -> Vec<Watcher> {
        self.watchers.get(&addr).cloned().unwrap_or_default()
    }

    pub fn request_interrupt(&mut self, interrupt: Interrupt) {
        trace!("Requesting interrupt {}", interrupt);
        let flags = self.read_as_io::<InterruptFlags>(INTERRUPT_FLAGS_REGISTER) | interrupt.flag();
        self.write_interrupt_flags(flags);
    }

    pub fn unrequest_interrupt(&mut self, interrupt: Interrupt) {
        let flags = self.read_as_io::<InterruptFlags>(INTERRUPT_FLAGS_REGISTER) - interrupt.flag();
        self.write_interrupt_flags(flags);
    }

    /// Requested and enabled state of every source, highest priority first.
    pub fn interrupt_info(&self) -> [InterruptInfo; 5] {
        let requested = self.read_as_io::<InterruptFlags>(INTERRUPT_FLAGS_REGISTER);
        let enabled = self.read_as_io::<InterruptFlags>(INTERRUPT_ENABLE_REGISTER);

        Interrupt::ALL.map(|interrupt| InterruptInfo {
            interrupt,
            requested: requested.contains(interrupt.flag()),
            enabled: enabled.contains(interrupt.flag()),
            vector: interrupt.to_address(),
        })
    }

    pub fn current_rom_bank(&self) -> u16 {
        self.cartridge.current_rom_bank()
    }

    pub fn tick_cartridge_clock(&mut self) {
        self.cartridge.tick_clock();
    }

    #[inline]
    pub fn vram_bank(&self) -> u8 {
        self.read_io(VRAM_BANK_REGISTER) & 0b1
    }

    #[inline]
    pub fn wram_bank(&self) -> u8 {
        // Bank 0 is always mapped at 0xc000, selecting it maps bank 1
        match self.read_io(WRAM_BANK_REGISTER) & 0b111 {
            0 => 1,
            bank => bank,
        }
    }

    fn write_interrupt_flags(&mut self, flags: InterruptFlags) {
        // Upper three bits are unused, keep whatever was stored there
        let unused = self.read_io(INTERRUPT_FLAGS_REGISTER) & 0b1110_0000;
        self.write_io(INTERRUPT_FLAGS_REGISTER, unused | flags.bits());
    }

    #[inline]
    fn vram_offset(&self, bank: u8, addr: u16) -> usize {
        (bank & 0b1) as usize * VRAM_BANK_SIZE + (addr - VRAM_START) as usize
    }

    #[inline]
    fn wram_offset(&self, addr: u16) -> usize {
        match addr {
            0xc000..=0xcfff => (addr - 0xc000) as usize,
            _ => self.wram_bank() as usize * WRAM_BANK_SIZE + (addr - 0xd000) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::mapper::rom::Rom;

    fn mmu() -> Mmu {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0150] = 0xab;
        Mmu::new(Box::new(Rom::new(rom)))
    }

    #[test]
    fn reads_cartridge_through_mapper() {
        let mmu = mmu();
        assert_eq!(mmu.read(0x0150).unwrap(), 0xab);
    }

    #[test]
    fn rom_writes_never_reach_storage() {
        let mut mmu = mmu();
        mmu.write(0x0150, 0x00).unwrap();
        mmu.write(0x2000, 0x05).unwrap();
        assert_eq!(mmu.read(0x0150).unwrap(), 0xab);
    }

    #[test]
    fn wram_bank_zero_selects_bank_one() {
        let mut mmu = mmu();

        mmu.write(WRAM_BANK_REGISTER, 0x01).unwrap();
        mmu.write(0xd000, 0x11).unwrap();
        mmu.write(WRAM_BANK_REGISTER, 0x02).unwrap();
        mmu.write(0xd000, 0x22).unwrap();

        mmu.write(WRAM_BANK_REGISTER, 0x00).unwrap();
        assert_eq!(mmu.wram_bank(), 1);
        assert_eq!(mmu.read(0xd000).unwrap(), 0x11);

        mmu.write(WRAM_BANK_REGISTER, 0x0a).unwrap();
        assert_eq!(mmu.read(0xd000).unwrap(), 0x22);
    }

    #[test]
    fn fixed_wram_bank_ignores_selection() {
        let mut mmu = mmu();
        mmu.write(0xc123, 0x77).unwrap();
        mmu.write(WRAM_BANK_REGISTER, 0x05).unwrap();
        assert_eq!(mmu.read(0xc123).unwrap(), 0x77);
        assert_eq!(mmu.read(0xe123).unwrap(), 0x77);
    }

    #[test]
    fn vram_is_banked() {
        let mut mmu = mmu();
        mmu.write(0x8000, 0x01).unwrap();
        mmu.write(VRAM_BANK_REGISTER, 0x01).unwrap();
        mmu.write(0x8000, 0x02).unwrap();

        assert_eq!(mmu.read(0x8000).unwrap(), 0x02);
        assert_eq!(mmu.read_from_vram(0x8000, 0), 0x01);
        assert_eq!(mmu.read_from_vram(0x8000, 1), 0x02);
    }

    #[test]
    fn any_divider_write_resets_it() {
        let mut mmu = mmu();
        mmu.write_io(DIV_REGISTER, 0x42);
        mmu.write(DIV_REGISTER, 0x99).unwrap();
        assert_eq!(mmu.read(DIV_REGISTER).unwrap(), 0x00);
    }

    #[test]
    fn palette_data_goes_through_index_register() {
        let mut mmu = mmu();
        mmu.write(BACKGROUND_PALETTE_INDEX_REGISTER, 0x80).unwrap();
        mmu.write(BACKGROUND_PALETTE_DATA_REGISTER, 0xff).unwrap();
        mmu.write(BACKGROUND_PALETTE_DATA_REGISTER, 0x7f).unwrap();

        assert_eq!(mmu.cram.fetch_bg(0, 0), 0x7fff);
        assert_eq!(mmu.read(BACKGROUND_PALETTE_INDEX_REGISTER).unwrap() & 0x3f, 2);
        assert_eq!(mmu.cram.fetch_obj(0, 0), 0x0000);
    }

    #[test]
    fn unusable_region_is_an_error() {
        let mut mmu = mmu();
        assert!(matches!(
            mmu.read(0xfea0),
            Err(GbError::OutOfBoundsMemoryAccess { address: 0xfea0 })
        ));
        assert!(mmu.write(0xfeff, 0x00).is_err());
    }

    #[test]
    fn status_mode_bits_are_read_only() {
        let mut mmu = mmu();
        mmu.write_io(LCD_STATUS_REGISTER, 0b1000_0110);
        mmu.write(LCD_STATUS_REGISTER, 0b0100_0001).unwrap();
        assert_eq!(mmu.read(LCD_STATUS_REGISTER).unwrap(), 0b1100_0110);
    }

    #[test]
    fn power_on_io_values() {
        let mmu = mmu();
        for (addr, value) in IO_POWER_ON {
            assert_eq!(mmu.read_io(addr), value, "${:04x}", addr);
        }

        assert_eq!(mmu.read(crate::video::LCD_CONTROL_REGISTER).unwrap(), 0x91);
        assert_eq!(mmu.read(LCD_STATUS_REGISTER).unwrap(), 0x85);
        assert_eq!(mmu.read(crate::video::BG_PALETTE_REGISTER).unwrap(), 0xfc);
        assert_eq!(mmu.read(crate::video::OBJ0_PALETTE_REGISTER).unwrap(), 0xff);
        assert_eq!(mmu.read(crate::video::OBJ1_PALETTE_REGISTER).unwrap(), 0xff);
        assert_eq!(mmu.read(TAC_REGISTER).unwrap(), 0xf8);
        assert_eq!(mmu.read(INTERRUPT_FLAGS_REGISTER).unwrap(), 0xe1);
        assert_eq!(mmu.read(INTERRUPT_ENABLE_REGISTER).unwrap(), 0x00);
        assert_eq!(mmu.vram_bank(), 0);
        assert_eq!(mmu.wram_bank(), 1);
    }

    #[test]
    fn oam_is_plain_storage() {
        let mut mmu = mmu();
        mmu.write(OAM_START, 0x12).unwrap();
        mmu.write(OAM_END, 0x34).unwrap();

        assert_eq!(mmu.read(OAM_START).unwrap(), 0x12);
        assert_eq!(mmu.read(OAM_END).unwrap(), 0x34);
        assert_eq!(mmu.read(OAM_START + 1).unwrap(), 0x00);
    }

    #[test]
    fn scanline_ignores_cpu_writes() {
        let mut mmu = mmu();
        mmu.write_io(SCANLINE_Y_REGISTER, 0x42);
        mmu.write(SCANLINE_Y_REGISTER, 0x00).unwrap();
        assert_eq!(mmu.read(SCANLINE_Y_REGISTER).unwrap(), 0x42);
    }

    #[test]
    fn interrupt_flags_upper_bits_read_set() {
        let mut mmu = mmu();
        mmu.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        assert_eq!(mmu.read(INTERRUPT_FLAGS_REGISTER).unwrap(), 0b1110_0000);

        mmu.write(INTERRUPT_FLAGS_REGISTER, 0b0000_0101).unwrap();
        assert_eq!(mmu.read(INTERRUPT_FLAGS_REGISTER).unwrap(), 0b1110_0101);

        mmu.request_interrupt(Interrupt::Joypad);
        assert_eq!(mmu.read(INTERRUPT_FLAGS_REGISTER).unwrap(), 0b1111_0101);
    }

    #[test]
    fn interrupt_requests_round_trip() {
        let mut mmu = mmu();
        mmu.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        mmu.write(INTERRUPT_ENABLE_REGISTER, 0b0000_0101).unwrap();

        mmu.request_interrupt(Interrupt::Timer);
        mmu.request_interrupt(Interrupt::Serial);

        let info = mmu.interrupt_info();
        assert_eq!(info[0].interrupt, Interrupt::VBlank);
        assert!(!info[0].requested && info[0].enabled);
        assert!(info[2].requested && info[2].enabled && info[2].is_pending());
        assert!(info[3].requested && !info[3].enabled);
        assert_eq!(info[4].vector, 0x0060);

        mmu.unrequest_interrupt(Interrupt::Timer);
        assert!(!mmu.interrupt_info()[2].requested);
        assert_eq!(mmu.read(INTERRUPT_FLAGS_REGISTER).unwrap(), 0b1110_1000);
    }
}
