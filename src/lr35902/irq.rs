use crate::memory::registers::InterruptFlags;

#[derive(Clone)]
pub struct Ime {
    pub enabled: bool,
    pub enable_pending: bool,
}

impl Default for Ime {
    fn default() -> Ime {
        Ime {
            enabled: true,
            enable_pending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Every source, highest priority first.
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub fn flag(&self) -> InterruptFlags {
        match self {
            Interrupt::VBlank => InterruptFlags::VBLANK,
            Interrupt::LcdStat => InterruptFlags::LCD_STAT,
            Interrupt::Timer => InterruptFlags::TIMER,
            Interrupt::Serial => InterruptFlags::SERIAL,
            Interrupt::Joypad => InterruptFlags::JOYPAD,
        }
    }

    pub fn to_address(&self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Interrupt::VBlank => write!(f, "VBLANK"),
            Interrupt::LcdStat => write!(f, "STAT"),
            Interrupt::Timer => write!(f, "TIMER"),
            Interrupt::Serial => write!(f, "SERIAL"),
            Interrupt::Joypad => write!(f, "JOYPAD"),
        }
    }
}

/// Snapshot of one interrupt source as seen through IE and IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptInfo {
    pub interrupt: Interrupt,
    pub requested: bool,
    pub enabled: bool,
    pub vector: u16,
}

impl InterruptInfo {
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.requested && self.enabled
    }
}
