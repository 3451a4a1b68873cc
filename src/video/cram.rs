const PALETTE_SIZE: usize = 64;
const AUTO_INCREMENT: u8 = 0b1000_0000;
const INDEX_MASK: u8 = 0b0011_1111;

/// One of the two 64 byte color palette tables together with its index register.
#[derive(Clone)]
pub struct PaletteTable {
    data: [u8; PALETTE_SIZE],
    index: u8,
}

impl PaletteTable {
    fn new() -> PaletteTable {
        PaletteTable {
            data: [0; PALETTE_SIZE],
            index: 0,
        }
    }

    #[inline]
    pub fn read_index(&self) -> u8 {
        // Bit 6 is unused and always reads back set
        self.index | 0b0100_0000
    }

    #[inline]
    pub fn write_index(&mut self, data: u8) {
        self.index = data & (AUTO_INCREMENT | INDEX_MASK);
    }

    #[inline]
    pub fn read_data(&self) -> u8 {
        self.data[(self.index & INDEX_MASK) as usize]
    }

    pub fn write_data(&mut self, data: u8) {
        let address = self.index & INDEX_MASK;
        self.data[address as usize] = data;

        if self.index & AUTO_INCREMENT != 0 {
            let next = (address + 1) % PALETTE_SIZE as u8;
            self.index = AUTO_INCREMENT | next;
        }
    }

    /// Little endian 15-bit color `color` (0..=3) of palette `slot` (0..=7).
    pub fn fetch(&self, slot: u8, color: u8) -> u16 {
        let offset = ((slot & 0b111) * 8 + (color & 0b11) * 2) as usize;
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }
}

#[derive(Clone)]
pub struct Cram {
    pub background: PaletteTable,
    pub object: PaletteTable,
}

impl Cram {
    pub fn new() -> Cram {
        Cram {
            background: PaletteTable::new(),
            object: PaletteTable::new(),
        }
    }

    #[inline]
    pub fn fetch_bg(&self, slot: u8, color: u8) -> u16 {
        self.background.fetch(slot, color)
    }

    #[inline]
    pub fn fetch_obj(&self, slot: u8, color: u8) -> u16 {
        self.object.fetch(slot, color)
    }
}

impl Default for Cram {
    fn default() -> Cram {
        Cram::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_increment_wraps_modulo_table_size() {
        let mut cram = Cram::new();
        cram.background.write_index(AUTO_INCREMENT | 0x3e);
        cram.background.write_data(0x11);
        cram.background.write_data(0x22);
        cram.background.write_data(0x33);

        assert_eq!(cram.background.read_index(), 0b1100_0001);
        cram.background.write_index(0x3e);
        assert_eq!(cram.background.read_data(), 0x11);
        cram.background.write_index(0x3f);
        assert_eq!(cram.background.read_data(), 0x22);
        cram.background.write_index(0x00);
        assert_eq!(cram.background.read_data(), 0x33);
    }

    #[test]
    fn index_without_increment_bit_stays_put() {
        let mut cram = Cram::new();
        cram.object.write_index(0x05);
        cram.object.write_data(0xaa);
        cram.object.write_data(0xbb);
        assert_eq!(cram.object.read_index() & INDEX_MASK, 0x05);
        assert_eq!(cram.object.read_data(), 0xbb);
    }

    #[test]
    fn tables_are_independent() {
        let mut cram = Cram::new();
        cram.background.write_index(AUTO_INCREMENT);
        cram.object.write_index(AUTO_INCREMENT | 0x10);
        cram.background.write_data(0x1f);
        cram.background.write_data(0x00);

        assert_eq!(cram.fetch_bg(0, 0), 0x001f);
        assert_eq!(cram.fetch_obj(0, 0), 0x0000);
        assert_eq!(cram.object.read_index() & INDEX_MASK, 0x10);
    }

    #[test]
    fn fetch_reads_little_endian_slots() {
        let mut cram = Cram::new();
        // Palette 1, color 2 lives at byte 8 + 4
        cram.background.write_index(AUTO_INCREMENT | 12);
        cram.background.write_data(0xe0);
        cram.background.write_data(0x03);
        assert_eq!(cram.fetch_bg(1, 2), 0x03e0);
    }
}
