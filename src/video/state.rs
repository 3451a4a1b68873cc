/// PPU phases. Durations are in T-cycles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    HBlank,  // H-Blank
    VBlank,  // V-Blank
    OamScan, // OAM Scan
    Drawing, // Drawing
}

pub const OAM_SCAN_CYCLES: u64 = 80;
pub const DRAWING_CYCLES: u64 = 172;
pub const HBLANK_CYCLES: u64 = 204;
pub const SCANLINE_CYCLES: u64 = OAM_SCAN_CYCLES + DRAWING_CYCLES + HBLANK_CYCLES;

pub const VISIBLE_LINES: u8 = 144;
pub const TOTAL_LINES: u8 = 154;
pub const VBLANK_CYCLES: u64 = (TOTAL_LINES - VISIBLE_LINES) as u64 * SCANLINE_CYCLES;

impl State {
    pub fn as_u8(self) -> u8 {
        match self {
            State::HBlank => 0,
            State::VBlank => 1,
            State::OamScan => 2,
            State::Drawing => 3,
        }
    }
}
