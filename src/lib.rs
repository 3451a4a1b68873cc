pub mod clock;
pub mod error;
pub mod gameboy;
pub mod hardware;
pub mod joypad;
pub mod lr35902;
pub mod memory;
pub mod video;
