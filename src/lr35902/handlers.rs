use crate::error::GbError;
use crate::hardware::Hardware;
use crate::lr35902::cpu::Cpu;
use crate::lr35902::registers::Flags;
use crate::lr35902::sm83::{AddressingMode, Condition, Instruction, Opcode, Operand, Register16};
use crate::memory::DIV_REGISTER;

pub struct Handlers {}

/// Every handler runs after PC already points past the instruction, so
/// relative jumps and pushed return addresses start from there.
impl Handlers {
    pub fn nop(_cpu: &mut Cpu, _hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        Ok(instruction.cycles.0)
    }

    pub fn load(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (dst, src) = Handlers::binary_operands(instruction)?;

        match (dst, src) {
            // ld (imm16), sp
            (Operand::Imm16(addr, mode), Operand::Reg16(reg, _)) if mode.contains(AddressingMode::Indirect) => {
                let value = cpu.registers.read_register16(reg);
                hw.write16(*addr, value)?;
            }
            // ld r16, imm16 / ld sp, hl / ld hl, sp+imm8
            (Operand::Reg16(reg, mode), _) if mode.contains(AddressingMode::Direct) => {
                let value = Handlers::resolve_operand(cpu, hw, src)?;
                cpu.registers.write_register16(reg, value);
            }
            _ => {
                let value = Handlers::resolve_operand(cpu, hw, src)? as u8;
                Handlers::write_operand(cpu, hw, dst, value)?;
            }
        }

        Ok(instruction.cycles.0)
    }

    pub fn add(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (dst, src) = Handlers::binary_operands(instruction)?;

        match (dst, src) {
            (Operand::Reg16(Register16::HL, _), _) => {
                let value = Handlers::resolve_operand(cpu, hw, src)?;
                let result = cpu.registers.add_hl(value);
                cpu.registers.write_register16(&Register16::HL, result);
            }
            (Operand::Reg16(Register16::SP, _), Operand::Offset(offset)) => {
                cpu.registers.sp = cpu.registers.add_sp(*offset);
            }
            _ => {
                let value = Handlers::resolve_operand(cpu, hw, src)? as u8;
                cpu.registers.a = match instruction.opcode {
                    Opcode::Adc => cpu.registers.adc(value),
                    _ => cpu.registers.add(value),
                };
            }
        }

        Ok(instruction.cycles.0)
    }

    pub fn sub(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (_, src) = Handlers::binary_operands(instruction)?;
        let value = Handlers::resolve_operand(cpu, hw, src)? as u8;

        match instruction.opcode {
            Opcode::Sub => cpu.registers.a = cpu.registers.sub(value),
            Opcode::Sbc => cpu.registers.a = cpu.registers.sbc(value),
            Opcode::Cp => cpu.registers.cp(value),
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    pub fn logic(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (_, src) = Handlers::binary_operands(instruction)?;
        let value = Handlers::resolve_operand(cpu, hw, src)? as u8;

        cpu.registers.a = match instruction.opcode {
            Opcode::And => cpu.registers.and(value),
            Opcode::Xor => cpu.registers.xor(value),
            Opcode::Or => cpu.registers.or(value),
            _ => return Handlers::invalid(instruction),
        };

        Ok(instruction.cycles.0)
    }

    pub fn increment(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let operand = Handlers::unary_operand(instruction)?;

        match operand {
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::Direct) => cpu.registers.increment16(reg),
            _ => {
                let value = Handlers::resolve_operand(cpu, hw, operand)? as u8;
                let result = cpu.registers.inc(value);
                Handlers::write_operand(cpu, hw, operand, result)?;
            }
        }

        Ok(instruction.cycles.0)
    }

    pub fn decrement(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let operand = Handlers::unary_operand(instruction)?;

        match operand {
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::Direct) => cpu.registers.decrement16(reg),
            _ => {
                let value = Handlers::resolve_operand(cpu, hw, operand)? as u8;
                let result = cpu.registers.dec(value);
                Handlers::write_operand(cpu, hw, operand, result)?;
            }
        }

        Ok(instruction.cycles.0)
    }

    /// rlca, rla, rrca and rra: like their prefixed forms on A, but Z is always cleared.
    pub fn rotate_accumulator(cpu: &mut Cpu, _hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let value = cpu.registers.a;

        cpu.registers.a = match instruction.opcode {
            Opcode::Rlca => cpu.registers.rlc(value),
            Opcode::Rla => cpu.registers.rl(value),
            Opcode::Rrca => cpu.registers.rrc(value),
            Opcode::Rra => cpu.registers.rr(value),
            _ => return Handlers::invalid(instruction),
        };
        cpu.registers.update_flag(Flags::ZERO, false);

        Ok(instruction.cycles.0)
    }

    pub fn shift(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let operand = Handlers::unary_operand(instruction)?;
        let value = Handlers::resolve_operand(cpu, hw, operand)? as u8;

        let result = match instruction.opcode {
            Opcode::Rlc => cpu.registers.rlc(value),
            Opcode::Rrc => cpu.registers.rrc(value),
            Opcode::Rl => cpu.registers.rl(value),
            Opcode::Rr => cpu.registers.rr(value),
            Opcode::Sla => cpu.registers.sla(value),
            Opcode::Sra => cpu.registers.sra(value),
            Opcode::Swap => cpu.registers.swap(value),
            Opcode::Srl => cpu.registers.srl(value),
            _ => return Handlers::invalid(instruction),
        };
        Handlers::write_operand(cpu, hw, operand, result)?;

        Ok(instruction.cycles.0)
    }

    pub fn test_bit(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (bit, operand) = Handlers::bit_operands(instruction)?;
        let value = Handlers::resolve_operand(cpu, hw, operand)? as u8;
        cpu.registers.bit(bit, value);

        Ok(instruction.cycles.0)
    }

    pub fn change_bit(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (bit, operand) = Handlers::bit_operands(instruction)?;
        let value = Handlers::resolve_operand(cpu, hw, operand)? as u8;

        let result = match instruction.opcode {
            Opcode::Res => value & !(1 << bit),
            Opcode::Set => value | (1 << bit),
            _ => return Handlers::invalid(instruction),
        };
        Handlers::write_operand(cpu, hw, operand, result)?;

        Ok(instruction.cycles.0)
    }

    pub fn accumulator(cpu: &mut Cpu, _hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        match instruction.opcode {
            Opcode::Daa => cpu.registers.a = cpu.registers.daa(),
            Opcode::Cpl => cpu.registers.a = cpu.registers.cpl(),
            Opcode::Scf => cpu.registers.scf(),
            Opcode::Ccf => cpu.registers.ccf(),
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    pub fn jump(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let (condition, target) = Handlers::binary_operands(instruction)?;
        let condition = match condition {
            Operand::Conditional(condition) => condition,
            _ => return Handlers::invalid(instruction),
        };

        if !Handlers::check_condition(cpu, condition) {
            return Ok(instruction.cycles.1.unwrap_or(instruction.cycles.0));
        }

        let pc = cpu.registers.pc;
        let destination = match (instruction.opcode, target) {
            (Opcode::Jr, Operand::Offset(offset)) => pc.wrapping_add_signed(*offset as i16),
            (Opcode::Jp, _) => Handlers::resolve_operand(cpu, hw, target)?,
            (Opcode::Call, _) => {
                let destination = Handlers::resolve_operand(cpu, hw, target)?;
                cpu.registers.push_word(hw, pc)?;
                destination
            }
            _ => return Handlers::invalid(instruction),
        };
        cpu.registers.pc = destination;

        Ok(instruction.cycles.0)
    }

    pub fn ret(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let condition = match Handlers::unary_operand(instruction)? {
            Operand::Conditional(condition) => condition,
            _ => return Handlers::invalid(instruction),
        };

        if !Handlers::check_condition(cpu, condition) {
            return Ok(instruction.cycles.1.unwrap_or(instruction.cycles.0));
        }

        cpu.registers.pc = cpu.registers.pop_word(hw)?;
        if instruction.opcode == Opcode::Reti {
            cpu.ime.enabled = true;
            cpu.ime.enable_pending = false;
        }

        Ok(instruction.cycles.0)
    }

    pub fn restart(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        let vector = match Handlers::unary_operand(instruction)? {
            Operand::Vector(vector) => *vector,
            _ => return Handlers::invalid(instruction),
        };

        let pc = cpu.registers.pc;
        cpu.registers.push_word(hw, pc)?;
        cpu.registers.pc = vector as u16;

        Ok(instruction.cycles.0)
    }

    pub fn push(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        match Handlers::unary_operand(instruction)? {
            Operand::Reg16(reg, _) => cpu.registers.push(hw, reg)?,
            operand => return Handlers::unresolved(operand),
        }

        Ok(instruction.cycles.0)
    }

    pub fn pop(cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        match Handlers::unary_operand(instruction)? {
            Operand::Reg16(reg, _) => cpu.registers.pop(hw, reg)?,
            operand => return Handlers::unresolved(operand),
        }

        Ok(instruction.cycles.0)
    }

    pub fn interrupts(cpu: &mut Cpu, _hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        match instruction.opcode {
            Opcode::Di => {
                cpu.ime.enabled = false;
                cpu.ime.enable_pending = false;
            }
            // Takes effect once the next instruction has run
            Opcode::Ei => cpu.ime.enable_pending = true,
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    pub fn halt(cpu: &mut Cpu, _hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        cpu.halted = true;
        Ok(instruction.cycles.0)
    }

    pub fn stop(_cpu: &mut Cpu, hw: &mut Hardware, instruction: &Instruction) -> Result<usize, GbError> {
        hw.write(DIV_REGISTER, 0)?;
        Ok(instruction.cycles.0)
    }

    fn binary_operands(instruction: &Instruction) -> Result<(&Operand, &Operand), GbError> {
        match (&instruction.lhs, &instruction.rhs) {
            (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
            _ => Handlers::invalid(instruction),
        }
    }

    fn unary_operand(instruction: &Instruction) -> Result<&Operand, GbError> {
        instruction
            .lhs
            .as_ref()
            .ok_or_else(|| GbError::InvalidHandler {
                instruction: instruction.clone(),
            })
    }

    fn bit_operands(instruction: &Instruction) -> Result<(u8, &Operand), GbError> {
        match Handlers::binary_operands(instruction)? {
            (Operand::Bit(bit), operand) => Ok((*bit, operand)),
            _ => Handlers::invalid(instruction),
        }
    }

    fn invalid<T>(instruction: &Instruction) -> Result<T, GbError> {
        Err(GbError::InvalidHandler {
            instruction: instruction.clone(),
        })
    }

    fn unresolved<T>(operand: &Operand) -> Result<T, GbError> {
        Err(GbError::UnresolvedTarget {
            target: operand.clone(),
        })
    }

    /// Steps HL after a `(hl+)` / `(hl-)` access.
    fn step_pointer(cpu: &mut Cpu, reg: &Register16, mode: &AddressingMode) {
        if mode.contains(AddressingMode::Increment) {
            cpu.registers.increment16(reg);
        } else if mode.contains(AddressingMode::Decrement) {
            cpu.registers.decrement16(reg);
        }
    }

    fn resolve_operand(cpu: &mut Cpu, hw: &mut Hardware, operand: &Operand) -> Result<u16, GbError> {
        let value = match operand {
            Operand::Reg8(reg, mode) if mode.contains(AddressingMode::Indirect) => {
                // ld a, (c)
                let addr = 0xff00 + cpu.registers.read_register(reg) as u16;
                hw.read(addr)? as u16
            }
            Operand::Reg8(reg, _) => cpu.registers.read_register(reg) as u16,
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::Indirect) => {
                let addr = cpu.registers.read_register16(reg);
                let value = hw.read(addr)?;
                Handlers::step_pointer(cpu, reg, mode);
                value as u16
            }
            Operand::Reg16(reg, _) => cpu.registers.read_register16(reg),
            Operand::Imm8(imm, mode) if mode.contains(AddressingMode::Indirect) => {
                // ldh a, (imm)
                hw.read(0xff00 + *imm as u16)? as u16
            }
            Operand::Imm8(imm, _) => *imm as u16,
            Operand::Imm16(imm, mode) if mode.contains(AddressingMode::Indirect) => hw.read(*imm)? as u16,
            Operand::Imm16(imm, _) => *imm,
            // ld hl, sp+imm8 sets the same flags as add sp, imm8
            Operand::DisplacedReg16(Register16::SP, offset, _) => cpu.registers.add_sp(*offset),
            _ => return Handlers::unresolved(operand),
        };

        Ok(value)
    }

    fn write_operand(cpu: &mut Cpu, hw: &mut Hardware, operand: &Operand, value: u8) -> Result<(), GbError> {
        match operand {
            Operand::Reg8(reg, mode) if mode.contains(AddressingMode::Indirect) => {
                // ld (c), a
                let addr = 0xff00 + cpu.registers.read_register(reg) as u16;
                hw.write(addr, value)?;
            }
            Operand::Reg8(reg, _) => cpu.registers.write_register(reg, value),
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::Indirect) => {
                let addr = cpu.registers.read_register16(reg);
                hw.write(addr, value)?;
                Handlers::step_pointer(cpu, reg, mode);
            }
            Operand::Imm8(imm, mode) if mode.contains(AddressingMode::Indirect) => {
                hw.write(0xff00 + *imm as u16, value)?;
            }
            Operand::Imm16(imm, mode) if mode.contains(AddressingMode::Indirect) => hw.write(*imm, value)?,
            _ => return Handlers::unresolved(operand),
        }

        Ok(())
    }

    fn check_condition(cpu: &Cpu, condition: &Condition) -> bool {
        match condition {
            Condition::Z => cpu.registers.read_flag(Flags::ZERO),
            Condition::NZ => !cpu.registers.read_flag(Flags::ZERO),
            Condition::C => cpu.registers.read_flag(Flags::CARRY),
            Condition::NC => !cpu.registers.read_flag(Flags::CARRY),
            Condition::None => true,
        }
    }
}
