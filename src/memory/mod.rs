pub mod mapper;
pub mod mmu;
pub mod registers;

pub const JOYPAD_REGISTER: u16 = 0xff00;
pub const DIV_REGISTER: u16 = 0xff04;
pub const TIMA_REGISTER: u16 = 0xff05;
pub const TMA_REGISTER: u16 = 0xff06;
pub const TAC_REGISTER: u16 = 0xff07;
pub const INTERRUPT_FLAGS_REGISTER: u16 = 0xff0f;
pub const VRAM_BANK_REGISTER: u16 = 0xff4f;
pub const BACKGROUND_PALETTE_INDEX_REGISTER: u16 = 0xff68;
pub const BACKGROUND_PALETTE_DATA_REGISTER: u16 = 0xff69;
pub const OBJECT_PALETTE_INDEX_REGISTER: u16 = 0xff6a;
pub const OBJECT_PALETTE_DATA_REGISTER: u16 = 0xff6b;
pub const WRAM_BANK_REGISTER: u16 = 0xff70;
pub const INTERRUPT_ENABLE_REGISTER: u16 = 0xffff;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9fff;
pub const VRAM_BANK_SIZE: usize = 0x2000;
pub const EXTERNAL_RAM_START: u16 = 0xa000;
pub const EXTERNAL_RAM_END: u16 = 0xbfff;
pub const EXTERNAL_RAM_BANK_SIZE: usize = 0x2000;
pub const WRAM_BANK_SIZE: usize = 0x1000;
pub const OAM_START: u16 = 0xfe00;
pub const OAM_END: u16 = 0xfe9f;
