use crate::error::GbError;
use crate::memory::mapper::{banked_rom_offset, Mapper};
use crate::memory::{EXTERNAL_RAM_END, EXTERNAL_RAM_START};
use log::{debug, warn};

pub struct Rom {
    memory: Vec<u8>,
}

impl Rom {
    pub fn new(memory: Vec<u8>) -> Rom {
        Rom { memory }
    }
}

impl Mapper for Rom {
    #[inline]
    fn read(&self, addr: u16) -> Result<u8, GbError> {
        match addr {
            0x0000..=0x3fff => Ok(self.memory[addr as usize]),
            0x4000..=0x7fff => {
                let offset = banked_rom_offset(self.memory.len(), 1, addr);
                self.memory
                    .get(offset)
                    .copied()
                    .ok_or(GbError::OutOfBoundsMemoryAccess { address: addr })
            }
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                warn!("ROM: Read from missing external RAM at {:04x}", addr);
                Ok(0xff)
            }
            _ => Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8) -> Result<(), GbError> {
        match addr {
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                warn!("ROM: Dropped write of {:02x} to missing external RAM at {:04x}", data, addr);
                Ok(())
            }
            _ => Err(GbError::OutOfBoundsMemoryAccess { address: addr }),
        }
    }

    // There is no controller on these carts, bank control writes go nowhere.
    fn enable_ram(&mut self, data: u8) {
        debug!("ROM: Ignoring RAM enable write {:02x}", data);
    }

    fn select_rom_bank(&mut self, data: u8) {
        debug!("ROM: Ignoring ROM bank select {:02x}", data);
    }

    fn select_ram_bank(&mut self, data: u8) -> Result<(), GbError> {
        debug!("ROM: Ignoring RAM bank select {:02x}", data);
        Ok(())
    }

    fn latch_clock_data(&mut self, data: u8) {
        debug!("ROM: Ignoring clock latch write {:02x}", data);
    }

    #[inline]
    fn current_rom_bank(&self) -> u16 {
        1
    }

    #[inline]
    fn current_ram_bank(&self) -> u8 {
        0
    }

    #[inline]
    fn name(&self) -> String {
        String::from("ROM")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_halves_and_ignores_control_writes() {
        let mut memory = vec![0u8; 0x8000];
        memory[0x0100] = 0x12;
        memory[0x4100] = 0x34;
        let mut rom = Rom::new(memory);

        rom.select_rom_bank(0x05);
        assert_eq!(rom.read(0x0100).unwrap(), 0x12);
        assert_eq!(rom.read(0x4100).unwrap(), 0x34);
        assert_eq!(rom.read(0xa000).unwrap(), 0xff);
        assert!(rom.write(0xa000, 0x01).is_ok());
    }
}
