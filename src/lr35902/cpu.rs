use crate::error::GbError;
use crate::hardware::Hardware;
use crate::lr35902::handlers::Handlers;
use crate::lr35902::irq::Ime;
use crate::lr35902::registers::Registers;
use crate::lr35902::sm83::{Instruction, Opcode, Sm83};
use log::trace;

/// Fetching the `0xcb` prefix costs one extra M-cycle on top of the prefixed instruction.
const PREFIX_CYCLES: usize = 4;
/// Dispatching an interrupt costs as much as a `call`.
const INTERRUPT_CYCLES: usize = 24;
/// Time that passes per step while the CPU is halted.
const HALT_CYCLES: usize = 4;

pub struct Cpu {
    sm83: Sm83,
    pub registers: Registers,
    pub(crate) ime: Ime,
    pub(crate) halted: bool,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            sm83: Sm83::new(),
            registers: Registers::default(),
            ime: Ime::default(),
            halted: false,
        }
    }

    #[inline]
    pub fn ime(&self) -> bool {
        self.ime.enabled
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Runs one instruction, lets the clock catch up with it and then gives
    /// pending interrupts a chance. Returns the cycles the clock advanced by.
    pub fn step(&mut self, hw: &mut Hardware) -> Result<usize, GbError> {
        if self.halted {
            hw.advance(HALT_CYCLES as u64)?;
            return Ok(HALT_CYCLES + self.handle_interrupts(hw)?);
        }

        let enable_interrupts = self.ime.enable_pending;
        let pc = self.registers.pc;
        let instruction = self.sm83.decode(hw, pc)?;
        trace!("[{:04x}] {}", pc, instruction);

        // Fall-through address; control transfers overwrite it
        self.registers.pc = pc.wrapping_add(instruction.length as u16);

        let mut cycles = self.execute(hw, &instruction)?;
        if instruction.is_prefixed() {
            cycles += PREFIX_CYCLES;
        }
        hw.advance(cycles as u64)?;

        if enable_interrupts && self.ime.enable_pending {
            self.ime.enabled = true;
            self.ime.enable_pending = false;
        }

        Ok(cycles + self.handle_interrupts(hw)?)
    }

    fn execute(&mut self, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        match instruction.opcode {
            Opcode::Nop => Handlers::nop(self, hw, instruction),
            Opcode::Ld | Opcode::Ldh => Handlers::load(self, hw, instruction),
            Opcode::Inc => Handlers::increment(self, hw, instruction),
            Opcode::Dec => Handlers::decrement(self, hw, instruction),
            Opcode::Add | Opcode::Adc => Handlers::add(self, hw, instruction),
            Opcode::Sub | Opcode::Sbc | Opcode::Cp => Handlers::sub(self, hw, instruction),
            Opcode::And | Opcode::Xor | Opcode::Or => Handlers::logic(self, hw, instruction),
            Opcode::Rlca | Opcode::Rla | Opcode::Rrca | Opcode::Rra => {
                Handlers::rotate_accumulator(self, hw, instruction)
            }
            Opcode::Daa | Opcode::Cpl | Opcode::Scf | Opcode::Ccf => Handlers::accumulator(self, hw, instruction),
            Opcode::Jr | Opcode::Jp | Opcode::Call => Handlers::jump(self, hw, instruction),
            Opcode::Ret | Opcode::Reti => Handlers::ret(self, hw, instruction),
            Opcode::Rst => Handlers::restart(self, hw, instruction),
            Opcode::Push => Handlers::push(self, hw, instruction),
            Opcode::Pop => Handlers::pop(self, hw, instruction),
            Opcode::Di | Opcode::Ei => Handlers::interrupts(self, hw, instruction),
            Opcode::Halt => Handlers::halt(self, hw, instruction),
            Opcode::Stop => Handlers::stop(self, hw, instruction),
            Opcode::Rlc
            | Opcode::Rrc
            | Opcode::Rl
            | Opcode::Rr
            | Opcode::Sla
            | Opcode::Sra
            | Opcode::Swap
            | Opcode::Srl => Handlers::shift(self, hw, instruction),
            Opcode::Bit => Handlers::test_bit(self, hw, instruction),
            Opcode::Res | Opcode::Set => Handlers::change_bit(self, hw, instruction),
        }
    }

    /// Dispatches the highest priority interrupt that is both requested and
    /// enabled. Any such interrupt ends a HALT, even with IME cleared.
    fn handle_interrupts(&mut self, hw: &mut Hardware) -> Result<usize, GbError> {
        let info = match hw.mmu.interrupt_info().into_iter().find(|info| info.is_pending()) {
            Some(info) => info,
            None => return Ok(0),
        };

        if self.halted {
            trace!("Leaving HALT for {}", info.interrupt);
            self.halted = false;
        }

        if !self.ime.enabled {
            return Ok(0);
        }

        trace!("Dispatching {} to ${:04x}", info.interrupt, info.vector);
        self.ime.enabled = false;
        hw.mmu.unrequest_interrupt(info.interrupt);

        let pc = self.registers.pc;
        self.registers.push_word(hw, pc)?;
        self.registers.pc = info.vector;

        hw.advance(INTERRUPT_CYCLES as u64)?;
        Ok(INTERRUPT_CYCLES)
    }
}

impl Default for Cpu {
    fn default() -> Cpu {
        Cpu::new()
    }
}

impl std::fmt::Display for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "A: ${:02x}  F: ${:02x}  B: ${:02x}  C: ${:02x}  D: ${:02x}  E: ${:02x}  H: ${:02x}  L: ${:02x}  SP: ${:04x}  PC: ${:04x}  IME: {}",
            self.registers.a,
            self.registers.f.bits(),
            self.registers.b,
            self.registers.c,
            self.registers.d,
            self.registers.e,
            self.registers.h,
            self.registers.l,
            self.registers.sp,
            self.registers.pc,
            self.ime.enabled as u8
        )
    }
}
