use crate::memory::mmu::Mmu;
use crate::video::TILESET_0_ADDRESS;
use bitflags::bitflags;

const TILE_SIZE: u16 = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TileAttributes: u8 {
        const PALETTE   = 0b0000_0111;
        const BANK      = 0b0000_1000;
        const FLIP_X    = 0b0010_0000;
        const FLIP_Y    = 0b0100_0000;
        const PRIORITY  = 0b1000_0000;
    }
}

impl TileAttributes {
    #[inline]
    pub fn palette(&self) -> u8 {
        (*self & TileAttributes::PALETTE).bits()
    }

    #[inline]
    pub fn bank(&self) -> u8 {
        self.contains(TileAttributes::BANK) as u8
    }
}

impl From<u8> for TileAttributes {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

/// One 8 pixel row of a background tile, as 2-bit color indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRow {
    pub colors: [u8; 8],
    pub attributes: TileAttributes,
}

impl TileRow {
    /// Decodes row `y` (0..8) of tile `index`. Tile data is always addressed
    /// unsigned from `0x8000`.
    pub fn from(mmu: &Mmu, index: u8, attributes: TileAttributes, y: u8) -> TileRow {
        let y = if attributes.contains(TileAttributes::FLIP_Y) { 7 - (y & 7) } else { y & 7 };
        let address = TILESET_0_ADDRESS + index as u16 * TILE_SIZE + y as u16 * 2;

        let lsb = mmu.read_from_vram(address, attributes.bank());
        let msb = mmu.read_from_vram(address + 1, attributes.bank());

        let mut colors = [0; 8];
        for (x, color) in colors.iter_mut().enumerate() {
            let bit = if attributes.contains(TileAttributes::FLIP_X) { x } else { 7 - x };
            let lsb_bit = (lsb >> bit) & 0b0000_0001;
            let msb_bit = (msb >> bit) & 0b0000_0001;
            *color = (msb_bit << 1) | lsb_bit;
        }

        TileRow { colors, attributes }
    }
}
