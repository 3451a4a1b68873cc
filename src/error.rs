use crate::lr35902::sm83::{Instruction, Operand};
use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GbError {
    #[snafu(display(
        "Failed to decode {}instruction ({:02x}) at address: ${:04x}",
        if *prefixed { "prefixed " } else { "" },
        opcode,
        address
    ))]
    DecoderFailure { opcode: u8, address: u16, prefixed: bool },
    #[snafu(display("Out of bounds memory access at address: ${:04x}", address))]
    OutOfBoundsMemoryAccess { address: u16 },
    #[snafu(display("Invalid RAM bank selected: {:02x}", bank))]
    InvalidRamBank { bank: u8 },
    #[snafu(display("Invalid timer frequency in TAC: {:08b}", tac))]
    InvalidTimerFrequency { tac: u8 },
    #[snafu(display("Cartridge image too small: {} bytes", size))]
    CartridgeTooSmall { size: usize },
    #[snafu(display("Unsupported cartridge type: {:02x}", kind))]
    UnsupportedCartridge { kind: u8 },
    #[snafu(display("Invalid instruction handler implementation: {}", instruction))]
    InvalidHandler { instruction: Instruction },
    #[snafu(display("Unresolved target: {:?}", target))]
    UnresolvedTarget { target: Operand },
}
