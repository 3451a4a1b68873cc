use crate::error::{CartridgeTooSmallSnafu, GbError, UnsupportedCartridgeSnafu};
use crate::memory::ROM_BANK_SIZE;
use log::info;
use snafu::ensure;

pub mod mbc3;
pub mod rom;

use mbc3::Mbc3;
use rom::Rom;

const CARTRIDGE_TYPE_ADDRESS: usize = 0x0147;

/// Bank-switching policy of a cartridge controller.
///
/// The MMU forwards every write in `0x0000..=0x7fff` to one of the four
/// control operations depending on the 8 KiB slice it lands in, and routes
/// ROM and external RAM accesses through `read`/`write`.
pub trait Mapper {
    fn read(&self, addr: u16) -> Result<u8, GbError>;
    fn write(&mut self, addr: u16, data: u8) -> Result<(), GbError>;

    fn enable_ram(&mut self, data: u8);
    fn select_rom_bank(&mut self, data: u8);
    fn select_ram_bank(&mut self, data: u8) -> Result<(), GbError>;
    fn latch_clock_data(&mut self, data: u8);

    /// Called once per emulated second.
    fn tick_clock(&mut self) {}

    fn current_rom_bank(&self) -> u16;
    fn current_ram_bank(&self) -> u8;
    fn name(&self) -> String;
}

/// Picks a controller based on the cartridge type byte of the header.
pub fn from_cartridge(rom: Vec<u8>) -> Result<Box<dyn Mapper>, GbError> {
    ensure!(rom.len() >= ROM_BANK_SIZE, CartridgeTooSmallSnafu { size: rom.len() });

    let kind = rom.get(CARTRIDGE_TYPE_ADDRESS).copied().unwrap_or(0x00);
    let mapper: Box<dyn Mapper> = match kind {
        0x00 => Box::new(Rom::new(rom)),
        0x0f..=0x13 => Box::new(Mbc3::new(rom)),
        _ => return UnsupportedCartridgeSnafu { kind }.fail(),
    };

    info!("Cartridge controller: {}", mapper.name());
    Ok(mapper)
}

/// Offset of `addr` inside the switchable window once `bank` is mapped in,
/// wrapping around the number of banks the image actually has.
pub(crate) fn banked_rom_offset(rom_len: usize, bank: u16, addr: u16) -> usize {
    let banks = (rom_len / ROM_BANK_SIZE).max(1);
    (bank as usize % banks) * ROM_BANK_SIZE + (addr as usize % ROM_BANK_SIZE)
}
