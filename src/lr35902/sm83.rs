use crate::error::GbError;
use crate::hardware::Hardware;
use bitflags::bitflags;
use std::fmt;

/// Builds the template for one opcode byte. Immediates are left zeroed and
/// filled in by [`Sm83::decode`].
type FDecode = fn(u8, Opcode) -> Instruction;

pub const PREFIX: u8 = 0xcb;

const INVALID_OPCODES: [u8; 11] = [0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd];

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Register16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

bitflags! {
    #[derive(PartialEq, Debug, Clone, Copy)]
    pub struct AddressingMode: u8 {
        const Direct    = 0b0001;
        const Indirect  = 0b0010;
        const Increment = 0b0100;
        const Decrement = 0b1000;
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Condition {
    None,
    NZ,
    Z,
    NC,
    C,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Operand {
    Reg8(Register, AddressingMode),
    Reg16(Register16, AddressingMode),
    Imm8(u8, AddressingMode),
    Imm16(u16, AddressingMode),
    Conditional(Condition),
    DisplacedReg16(Register16, i8, AddressingMode),
    Offset(i8),
    Bit(u8),
    Vector(u8),
}

#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Opcode {
    Nop,
    Ld,
    Ldh,
    Inc,
    Dec,
    Rlca,
    Rla,
    Rrca,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr,
    Jp,
    Call,
    Ret,
    Reti,
    Rst,
    Push,
    Pop,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
    Halt,
    Stop,
    Di,
    Ei,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
}

/// A decoded instruction. `cycles` holds the duration when a conditional
/// branch is taken and, for conditional ones, when it is not.
#[derive(PartialEq, Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub lhs: Option<Operand>,
    pub rhs: Option<Operand>,
    pub length: usize,
    pub cycles: (usize, Option<usize>),
}

impl Instruction {
    pub fn is_prefixed(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::Rlc
                | Opcode::Rrc
                | Opcode::Rl
                | Opcode::Rr
                | Opcode::Sla
                | Opcode::Sra
                | Opcode::Swap
                | Opcode::Srl
                | Opcode::Bit
                | Opcode::Res
                | Opcode::Set
        )
    }
}

macro_rules! define_decoder {
    ( $pattern:expr, $opcode:expr, $function:expr ) => {{
        (String::from($pattern), $opcode, $function)
    }};
}

/// Instruction decoder. Both opcode tables are resolved once from bit patterns
/// when the decoder is built; decoding is a table lookup afterwards.
#[derive(Clone)]
pub struct Sm83 {
    primary: Vec<Option<Instruction>>,
    prefixed: Vec<Option<Instruction>>,
}

//noinspection DuplicatedCode
impl Sm83 {
    pub fn new() -> Sm83 {
        let mut decoder_lut = Vec::new();
        let mut decoder_lut_prefixed = Vec::new();

        Sm83::propagate_decoders(&mut decoder_lut);
        Sm83::propagate_decoders_prefixed(&mut decoder_lut_prefixed);

        let primary = (0..=u8::MAX)
            .map(|byte| {
                if byte == PREFIX || INVALID_OPCODES.contains(&byte) {
                    None
                } else {
                    Sm83::resolve(&decoder_lut, byte)
                }
            })
            .collect();
        let prefixed = (0..=u8::MAX)
            .map(|byte| Sm83::resolve(&decoder_lut_prefixed, byte))
            .collect();

        Sm83 { primary, prefixed }
    }

    pub fn decode(&self, hw: &Hardware, current_pc: u16) -> Result<Instruction, GbError> {
        let opcode_byte = hw.read(current_pc)?;

        if opcode_byte == PREFIX {
            let opcode_byte = hw.read(current_pc.wrapping_add(1))?;
            return self.prefixed[opcode_byte as usize]
                .clone()
                .ok_or(GbError::DecoderFailure {
                    opcode: opcode_byte,
                    address: current_pc,
                    prefixed: true,
                });
        }

        let mut instruction = self.primary[opcode_byte as usize]
            .clone()
            .ok_or(GbError::DecoderFailure {
                opcode: opcode_byte,
                address: current_pc,
                prefixed: false,
            })?;

        instruction.lhs = Sm83::fetch_immediate(hw, current_pc, instruction.lhs)?;
        instruction.rhs = Sm83::fetch_immediate(hw, current_pc, instruction.rhs)?;

        Ok(instruction)
    }

    fn fetch_immediate(hw: &Hardware, current_pc: u16, operand: Option<Operand>) -> Result<Option<Operand>, GbError> {
        let immediate = current_pc.wrapping_add(1);

        let operand = match operand {
            Some(Operand::Imm8(_, mode)) => Some(Operand::Imm8(hw.read(immediate)?, mode)),
            Some(Operand::Imm16(_, mode)) => Some(Operand::Imm16(hw.read16(immediate)?, mode)),
            Some(Operand::Offset(_)) => Some(Operand::Offset(hw.read(immediate)? as i8)),
            Some(Operand::DisplacedReg16(reg, _, mode)) => {
                Some(Operand::DisplacedReg16(reg, hw.read(immediate)? as i8, mode))
            }
            operand => operand,
        };

        Ok(operand)
    }

    fn resolve(lut: &[(String, Opcode, FDecode)], opcode_byte: u8) -> Option<Instruction> {
        let opcode_str = format!("{:08b}", opcode_byte);

        lut.iter()
            .find(|(pattern, _, _)| {
                pattern.len() == opcode_str.len()
                    && pattern.chars().zip(opcode_str.chars()).all(|(p, c)| p == 'x' || p == c)
            })
            .map(|(_, opcode, decoder_fn)| decoder_fn(opcode_byte, *opcode))
    }

    fn lookup_register(data: u8) -> Register {
        match data & 0b111 {
            0b000 => Register::B,
            0b001 => Register::C,
            0b010 => Register::D,
            0b011 => Register::E,
            0b100 => Register::H,
            0b101 => Register::L,
            _ => Register::A,
        }
    }

    fn lookup_register_16(data: u8) -> Register16 {
        match data & 0b11 {
            0b00 => Register16::BC,
            0b01 => Register16::DE,
            0b10 => Register16::HL,
            _ => Register16::SP,
        }
    }

    /// Same encoding as [`Sm83::lookup_register_16`] except that `11` names AF.
    fn lookup_stack_register(data: u8) -> Register16 {
        match Sm83::lookup_register_16(data) {
            Register16::SP => Register16::AF,
            register => register,
        }
    }

    fn lookup_condition_3bits(data: u8) -> Condition {
        match data & 0b111 {
            0b100 => Condition::NZ,
            0b101 => Condition::Z,
            0b110 => Condition::NC,
            0b111 => Condition::C,
            _ => Condition::None,
        }
    }

    fn lookup_condition_2bits(data: u8) -> Condition {
        match data & 0b11 {
            0b00 => Condition::NZ,
            0b01 => Condition::Z,
            0b10 => Condition::NC,
            _ => Condition::C,
        }
    }

    /// `110` encodes `(HL)`, which costs `hl_cycles` instead of `base_cycles`.
    fn decode_8bit_operand(value: u8, base_cycles: usize, hl_cycles: usize) -> (Operand, usize) {
        if value & 0b111 == 0b110 {
            (Operand::Reg16(Register16::HL, AddressingMode::Indirect), hl_cycles)
        } else {
            (Operand::Reg8(Sm83::lookup_register(value), AddressingMode::Direct), base_cycles)
        }
    }

    fn implied(opcode: Opcode, cycles: usize) -> Instruction {
        Instruction {
            opcode,
            lhs: None,
            rhs: None,
            length: 1,
            cycles: (cycles, None),
        }
    }

    fn accumulator_imm8(opcode: Opcode) -> Instruction {
        Instruction {
            opcode,
            lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
            rhs: Some(Operand::Imm8(0, AddressingMode::Direct)),
            length: 2,
            cycles: (8, None),
        }
    }

    fn accumulator_r8(opcode_byte: u8, opcode: Opcode) -> Instruction {
        let (rhs, cycles) = Sm83::decode_8bit_operand(opcode_byte, 4, 8);

        Instruction {
            opcode,
            lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
            rhs: Some(rhs),
            length: 1,
            cycles: (cycles, None),
        }
    }

    fn prefixed_r8(opcode_byte: u8, opcode: Opcode) -> Instruction {
        let (lhs, cycles) = Sm83::decode_8bit_operand(opcode_byte, 4, 12);

        Instruction {
            opcode,
            lhs: Some(lhs),
            rhs: None,
            length: 2,
            cycles: (cycles, None),
        }
    }

    fn prefixed_bit(opcode_byte: u8, opcode: Opcode, hl_cycles: usize) -> Instruction {
        let bit = (opcode_byte & 0b0011_1000) >> 3;
        let (rhs, cycles) = Sm83::decode_8bit_operand(opcode_byte, 4, hl_cycles);

        Instruction {
            opcode,
            lhs: Some(Operand::Bit(bit)),
            rhs: Some(rhs),
            length: 2,
            cycles: (cycles, None),
        }
    }

    fn propagate_decoders(lut: &mut Vec<(String, Opcode, FDecode)>) {
        // nop
        lut.push(define_decoder!("00000000", Opcode::Nop, |_, opcode| Sm83::implied(opcode, 4)));

        // ld (imm16), SP
        lut.push(define_decoder!("00001000", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Imm16(0, AddressingMode::Indirect)),
                rhs: Some(Operand::Reg16(Register16::SP, AddressingMode::Direct)),
                length: 3,
                cycles: (20, None),
            }
        }));

        // stop imm8
        lut.push(define_decoder!("00010000", Opcode::Stop, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Imm8(0, AddressingMode::Direct)),
                rhs: None,
                length: 2,
                cycles: (4, None),
            }
        }));

        // rlca, rla, rrca, rra
        lut.push(define_decoder!("00000111", Opcode::Rlca, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00010111", Opcode::Rla, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00001111", Opcode::Rrca, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00011111", Opcode::Rra, |_, opcode| Sm83::implied(opcode, 4)));

        // daa, cpl, scf, ccf
        lut.push(define_decoder!("00100111", Opcode::Daa, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00101111", Opcode::Cpl, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00110111", Opcode::Scf, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("00111111", Opcode::Ccf, |_, opcode| Sm83::implied(opcode, 4)));

        // halt
        lut.push(define_decoder!("01110110", Opcode::Halt, |_, opcode| Sm83::implied(opcode, 4)));

        // di, ei
        lut.push(define_decoder!("11110011", Opcode::Di, |_, opcode| Sm83::implied(opcode, 4)));
        lut.push(define_decoder!("11111011", Opcode::Ei, |_, opcode| Sm83::implied(opcode, 4)));

        // add/adc/sub/sbc/and/xor/or/cp a, imm8
        lut.push(define_decoder!("11000110", Opcode::Add, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11001110", Opcode::Adc, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11010110", Opcode::Sub, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11011110", Opcode::Sbc, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11100110", Opcode::And, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11101110", Opcode::Xor, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11110110", Opcode::Or, |_, opcode| Sm83::accumulator_imm8(opcode)));
        lut.push(define_decoder!("11111110", Opcode::Cp, |_, opcode| Sm83::accumulator_imm8(opcode)));

        // reti
        lut.push(define_decoder!("11011001", Opcode::Reti, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(Condition::None)),
                rhs: None,
                length: 1,
                cycles: (16, None),
            }
        }));

        // jp HL
        lut.push(define_decoder!("11101001", Opcode::Jp, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(Condition::None)),
                rhs: Some(Operand::Reg16(Register16::HL, AddressingMode::Direct)),
                length: 1,
                cycles: (4, None),
            }
        }));

        // ldh (imm8), A
        lut.push(define_decoder!("11100000", Opcode::Ldh, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Imm8(0, AddressingMode::Indirect)),
                rhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                length: 2,
                cycles: (12, None),
            }
        }));

        // ldh A, (imm8)
        lut.push(define_decoder!("11110000", Opcode::Ldh, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                rhs: Some(Operand::Imm8(0, AddressingMode::Indirect)),
                length: 2,
                cycles: (12, None),
            }
        }));

        // ld (C), A
        lut.push(define_decoder!("11100010", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg8(Register::C, AddressingMode::Indirect)),
                rhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                length: 1,
                cycles: (8, None),
            }
        }));

        // ld A, (C)
        lut.push(define_decoder!("11110010", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                rhs: Some(Operand::Reg8(Register::C, AddressingMode::Indirect)),
                length: 1,
                cycles: (8, None),
            }
        }));

        // ld (imm16), A
        lut.push(define_decoder!("11101010", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Imm16(0, AddressingMode::Indirect)),
                rhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                length: 3,
                cycles: (16, None),
            }
        }));

        // ld A, (imm16)
        lut.push(define_decoder!("11111010", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                rhs: Some(Operand::Imm16(0, AddressingMode::Indirect)),
                length: 3,
                cycles: (16, None),
            }
        }));

        // add sp, imm8
        lut.push(define_decoder!("11101000", Opcode::Add, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Register16::SP, AddressingMode::Direct)),
                rhs: Some(Operand::Offset(0)),
                length: 2,
                cycles: (16, None),
            }
        }));

        // ld hl, sp+/-imm8
        lut.push(define_decoder!("11111000", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Register16::HL, AddressingMode::Direct)),
                rhs: Some(Operand::DisplacedReg16(Register16::SP, 0, AddressingMode::Direct)),
                length: 2,
                cycles: (12, None),
            }
        }));

        // ld sp, hl
        lut.push(define_decoder!("11111001", Opcode::Ld, |_, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Register16::SP, AddressingMode::Direct)),
                rhs: Some(Operand::Reg16(Register16::HL, AddressingMode::Direct)),
                length: 1,
                cycles: (8, None),
            }
        }));

        // jr cond, imm8 / jr imm8
        lut.push(define_decoder!("00xxx000", Opcode::Jr, |opcode_byte, opcode| {
            let condition = Sm83::lookup_condition_3bits((opcode_byte & 0b0011_1000) >> 3);
            let cycles = if condition != Condition::None { (12, Some(8)) } else { (12, None) };

            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(condition)),
                rhs: Some(Operand::Offset(0)),
                length: 2,
                cycles,
            }
        }));

        // ld r16, imm16
        lut.push(define_decoder!("00xx0001", Opcode::Ld, |opcode_byte, opcode| {
            let destination = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Sm83::lookup_register_16(destination), AddressingMode::Direct)),
                rhs: Some(Operand::Imm16(0, AddressingMode::Direct)),
                length: 3,
                cycles: (12, None),
            }
        }));

        // ld (r16), A
        lut.push(define_decoder!("00xx0010", Opcode::Ld, |opcode_byte, opcode| {
            let lhs = match opcode_byte {
                0x22 => Operand::Reg16(Register16::HL, AddressingMode::Indirect | AddressingMode::Increment),
                0x32 => Operand::Reg16(Register16::HL, AddressingMode::Indirect | AddressingMode::Decrement),
                _ => {
                    let destination = (opcode_byte & 0b0011_0000) >> 4;
                    Operand::Reg16(Sm83::lookup_register_16(destination), AddressingMode::Indirect)
                }
            };

            Instruction {
                opcode,
                lhs: Some(lhs),
                rhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                length: 1,
                cycles: (8, None),
            }
        }));

        // add HL, r16
        lut.push(define_decoder!("00xx1001", Opcode::Add, |opcode_byte, opcode| {
            let source = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Register16::HL, AddressingMode::Direct)),
                rhs: Some(Operand::Reg16(Sm83::lookup_register_16(source), AddressingMode::Direct)),
                length: 1,
                cycles: (8, None),
            }
        }));

        // ld A, (r16)
        lut.push(define_decoder!("00xx1010", Opcode::Ld, |opcode_byte, opcode| {
            let rhs = match opcode_byte {
                0x2a => Operand::Reg16(Register16::HL, AddressingMode::Indirect | AddressingMode::Increment),
                0x3a => Operand::Reg16(Register16::HL, AddressingMode::Indirect | AddressingMode::Decrement),
                _ => {
                    let source = (opcode_byte & 0b0011_0000) >> 4;
                    Operand::Reg16(Sm83::lookup_register_16(source), AddressingMode::Indirect)
                }
            };

            Instruction {
                opcode,
                lhs: Some(Operand::Reg8(Register::A, AddressingMode::Direct)),
                rhs: Some(rhs),
                length: 1,
                cycles: (8, None),
            }
        }));

        // ld r8, imm8 / ld (HL), imm8
        lut.push(define_decoder!("00xxx110", Opcode::Ld, |opcode_byte, opcode| {
            let (lhs, cycles) = Sm83::decode_8bit_operand((opcode_byte & 0b0011_1000) >> 3, 8, 12);

            Instruction {
                opcode,
                lhs: Some(lhs),
                rhs: Some(Operand::Imm8(0, AddressingMode::Direct)),
                length: 2,
                cycles: (cycles, None),
            }
        }));

        // inc r16
        lut.push(define_decoder!("00xx0011", Opcode::Inc, |opcode_byte, opcode| {
            let destination = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Sm83::lookup_register_16(destination), AddressingMode::Direct)),
                rhs: None,
                length: 1,
                cycles: (8, None),
            }
        }));

        // dec r16
        lut.push(define_decoder!("00xx1011", Opcode::Dec, |opcode_byte, opcode| {
            let destination = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Sm83::lookup_register_16(destination), AddressingMode::Direct)),
                rhs: None,
                length: 1,
                cycles: (8, None),
            }
        }));

        // inc r8 / inc (HL)
        lut.push(define_decoder!("00xxx100", Opcode::Inc, |opcode_byte, opcode| {
            let (lhs, cycles) = Sm83::decode_8bit_operand((opcode_byte & 0b0011_1000) >> 3, 4, 12);

            Instruction {
                opcode,
                lhs: Some(lhs),
                rhs: None,
                length: 1,
                cycles: (cycles, None),
            }
        }));

        // dec r8 / dec (HL)
        lut.push(define_decoder!("00xxx101", Opcode::Dec, |opcode_byte, opcode| {
            let (lhs, cycles) = Sm83::decode_8bit_operand((opcode_byte & 0b0011_1000) >> 3, 4, 12);

            Instruction {
                opcode,
                lhs: Some(lhs),
                rhs: None,
                length: 1,
                cycles: (cycles, None),
            }
        }));

        // ld r8, r8 / ld r8, (HL) / ld (HL), r8
        lut.push(define_decoder!("01xxxxxx", Opcode::Ld, |opcode_byte, opcode| {
            let (lhs, cycles1) = Sm83::decode_8bit_operand((opcode_byte & 0b0011_1000) >> 3, 4, 8);
            let (rhs, cycles2) = Sm83::decode_8bit_operand(opcode_byte & 0b0000_0111, 4, 8);

            Instruction {
                opcode,
                lhs: Some(lhs),
                rhs: Some(rhs),
                length: 1,
                cycles: (std::cmp::max(cycles1, cycles2), None),
            }
        }));

        // pop r16
        lut.push(define_decoder!("11xx0001", Opcode::Pop, |opcode_byte, opcode| {
            let destination = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Sm83::lookup_stack_register(destination), AddressingMode::Direct)),
                rhs: None,
                length: 1,
                cycles: (12, None),
            }
        }));

        // push r16
        lut.push(define_decoder!("11xx0101", Opcode::Push, |opcode_byte, opcode| {
            let source = (opcode_byte & 0b0011_0000) >> 4;

            Instruction {
                opcode,
                lhs: Some(Operand::Reg16(Sm83::lookup_stack_register(source), AddressingMode::Direct)),
                rhs: None,
                length: 1,
                cycles: (16, None),
            }
        }));

        // ret cond / ret
        lut.push(define_decoder!("110xx00x", Opcode::Ret, |opcode_byte, opcode| {
            if (opcode_byte & 0b0000_0001) != 0 {
                return Instruction {
                    opcode,
                    lhs: Some(Operand::Conditional(Condition::None)),
                    rhs: None,
                    length: 1,
                    cycles: (16, None),
                };
            }

            let condition = Sm83::lookup_condition_2bits((opcode_byte & 0b0001_1000) >> 3);
            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(condition)),
                rhs: None,
                length: 1,
                cycles: (20, Some(8)),
            }
        }));

        // jp cond, imm16 / jp imm16
        lut.push(define_decoder!("110xx01x", Opcode::Jp, |opcode_byte, opcode| {
            let condition = if (opcode_byte & 0b0000_0001) == 0 {
                Sm83::lookup_condition_2bits((opcode_byte & 0b0001_1000) >> 3)
            } else {
                Condition::None
            };
            let cycles = if condition != Condition::None { (16, Some(12)) } else { (16, None) };

            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(condition)),
                rhs: Some(Operand::Imm16(0, AddressingMode::Direct)),
                length: 3,
                cycles,
            }
        }));

        // call cond, imm16 / call imm16
        lut.push(define_decoder!("110xx10x", Opcode::Call, |opcode_byte, opcode| {
            let condition = if (opcode_byte & 0b0000_0001) == 0 {
                Sm83::lookup_condition_2bits((opcode_byte & 0b0001_1000) >> 3)
            } else {
                Condition::None
            };
            let cycles = if condition != Condition::None { (24, Some(12)) } else { (24, None) };

            Instruction {
                opcode,
                lhs: Some(Operand::Conditional(condition)),
                rhs: Some(Operand::Imm16(0, AddressingMode::Direct)),
                length: 3,
                cycles,
            }
        }));

        // add/adc/sub/sbc/and/xor/or/cp a, r8 / a, (HL)
        lut.push(define_decoder!("10000xxx", Opcode::Add, Sm83::accumulator_r8));
        lut.push(define_decoder!("10001xxx", Opcode::Adc, Sm83::accumulator_r8));
        lut.push(define_decoder!("10010xxx", Opcode::Sub, Sm83::accumulator_r8));
        lut.push(define_decoder!("10011xxx", Opcode::Sbc, Sm83::accumulator_r8));
        lut.push(define_decoder!("10100xxx", Opcode::And, Sm83::accumulator_r8));
        lut.push(define_decoder!("10101xxx", Opcode::Xor, Sm83::accumulator_r8));
        lut.push(define_decoder!("10110xxx", Opcode::Or, Sm83::accumulator_r8));
        lut.push(define_decoder!("10111xxx", Opcode::Cp, Sm83::accumulator_r8));

        // rst n
        lut.push(define_decoder!("11xxx111", Opcode::Rst, |opcode_byte, opcode| {
            Instruction {
                opcode,
                lhs: Some(Operand::Vector(opcode_byte & 0b0011_1000)),
                rhs: None,
                length: 1,
                cycles: (16, None),
            }
        }));
    }

    /// Durations here exclude the 4 cycles spent fetching the prefix.
    fn propagate_decoders_prefixed(lut: &mut Vec<(String, Opcode, FDecode)>) {
        lut.push(define_decoder!("00000xxx", Opcode::Rlc, Sm83::prefixed_r8));
        lut.push(define_decoder!("00001xxx", Opcode::Rrc, Sm83::prefixed_r8));
        lut.push(define_decoder!("00010xxx", Opcode::Rl, Sm83::prefixed_r8));
        lut.push(define_decoder!("00011xxx", Opcode::Rr, Sm83::prefixed_r8));
        lut.push(define_decoder!("00100xxx", Opcode::Sla, Sm83::prefixed_r8));
        lut.push(define_decoder!("00101xxx", Opcode::Sra, Sm83::prefixed_r8));
        lut.push(define_decoder!("00110xxx", Opcode::Swap, Sm83::prefixed_r8));
        lut.push(define_decoder!("00111xxx", Opcode::Srl, Sm83::prefixed_r8));

        // bit n, r8 / bit n, (HL)
        lut.push(define_decoder!("01xxxxxx", Opcode::Bit, |opcode_byte, opcode| {
            Sm83::prefixed_bit(opcode_byte, opcode, 8)
        }));

        // res n, r8 / res n, (HL)
        lut.push(define_decoder!("10xxxxxx", Opcode::Res, |opcode_byte, opcode| {
            Sm83::prefixed_bit(opcode_byte, opcode, 12)
        }));

        // set n, r8 / set n, (HL)
        lut.push(define_decoder!("11xxxxxx", Opcode::Set, |opcode_byte, opcode| {
            Sm83::prefixed_bit(opcode_byte, opcode, 12)
        }));
    }
}

impl Default for Sm83 {
    fn default() -> Sm83 {
        Sm83::new()
    }
}

impl Register {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::D => "d",
            Register::E => "e",
            Register::H => "h",
            Register::L => "l",
        }
    }
}

impl Register16 {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Register16::AF => "af",
            Register16::BC => "bc",
            Register16::DE => "de",
            Register16::HL => "hl",
            Register16::SP => "sp",
            Register16::PC => "pc",
        }
    }
}

impl Condition {
    /// Empty for unconditional control transfers.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Condition::None => "",
            Condition::NZ => "nz",
            Condition::Z => "z",
            Condition::NC => "nc",
            Condition::C => "c",
        }
    }
}

impl Operand {
    /// Unconditional markers take part in decoding but are not printed.
    fn is_silent(&self) -> bool {
        matches!(self, Operand::Conditional(Condition::None))
    }
}

/// Disassembly in lowercase assembler syntax, e.g. `ld (hl-), a` or `jr nz, -2`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self.opcode).to_lowercase())?;

        let operands = [&self.lhs, &self.rhs];
        let mut printed = operands.iter().filter_map(|operand| operand.as_ref()).filter(|operand| !operand.is_silent());

        if let Some(first) = printed.next() {
            write!(f, " {}", first)?;
        }
        for operand in printed {
            write!(f, ", {}", operand)?;
        }

        Ok(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Register16 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (open, close) = match self {
            Operand::Reg8(_, mode) | Operand::Reg16(_, mode) | Operand::Imm8(_, mode) | Operand::Imm16(_, mode)
                if mode.contains(AddressingMode::Indirect) =>
            {
                ("(", ")")
            }
            _ => ("", ""),
        };

        match self {
            Operand::Reg8(reg, _) => write!(f, "{}{}{}", open, reg, close),
            Operand::Reg16(reg, mode) => {
                let step = if mode.contains(AddressingMode::Increment) {
                    "+"
                } else if mode.contains(AddressingMode::Decrement) {
                    "-"
                } else {
                    ""
                };
                write!(f, "{}{}{}{}", open, reg, step, close)
            }
            Operand::Imm8(value, _) => write!(f, "{}${:02x}{}", open, value, close),
            Operand::Imm16(value, _) => write!(f, "{}${:04x}{}", open, value, close),
            Operand::Conditional(condition) => write!(f, "{}", condition),
            Operand::Offset(offset) => write!(f, "{:+}", offset),
            Operand::DisplacedReg16(reg, offset, _) => write!(f, "{}{:+}", reg, offset),
            Operand::Bit(bit) => write!(f, "{}", bit),
            Operand::Vector(vector) => write!(f, "${:02x}", vector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::tests::hardware;

    fn decode(bytes: &[u8]) -> Result<Instruction, GbError> {
        let mut hw = hardware();
        for (offset, byte) in bytes.iter().enumerate() {
            hw.write(0xc000 + offset as u16, *byte).unwrap();
        }
        Sm83::new().decode(&hw, 0xc000)
    }

    #[test]
    fn every_defined_opcode_decodes() {
        let sm83 = Sm83::new();
        let primary = sm83.primary.iter().filter(|entry| entry.is_some()).count();
        let prefixed = sm83.prefixed.iter().filter(|entry| entry.is_some()).count();

        assert_eq!(primary, 256 - INVALID_OPCODES.len() - 1);
        assert_eq!(prefixed, 256);
    }

    #[test]
    fn undefined_opcodes_fail_with_address() {
        for opcode in INVALID_OPCODES {
            match decode(&[opcode]) {
                Err(GbError::DecoderFailure {
                    opcode: reported,
                    address,
                    prefixed,
                }) => {
                    assert_eq!(reported, opcode);
                    assert_eq!(address, 0xc000);
                    assert!(!prefixed);
                }
                other => panic!("{:02x} decoded to {:?}", opcode, other),
            }
        }
    }

    #[test]
    fn immediates_are_fetched_little_endian() {
        let instruction = decode(&[0xc3, 0x34, 0x12]).unwrap();
        assert_eq!(instruction.opcode, Opcode::Jp);
        assert_eq!(instruction.rhs, Some(Operand::Imm16(0x1234, AddressingMode::Direct)));
        assert_eq!(instruction.length, 3);
        assert_eq!(instruction.to_string(), "jp $1234");

        let instruction = decode(&[0x20, 0xfe]).unwrap();
        assert_eq!(instruction.rhs, Some(Operand::Offset(-2)));
        assert_eq!(instruction.cycles, (12, Some(8)));
        assert_eq!(instruction.to_string(), "jr nz, -2");
    }

    #[test]
    fn shared_patterns_resolve_to_the_specific_instruction() {
        assert_eq!(decode(&[0x00]).unwrap().opcode, Opcode::Nop);
        assert_eq!(decode(&[0x76]).unwrap().opcode, Opcode::Halt);
        assert_eq!(decode(&[0xc1]).unwrap().opcode, Opcode::Pop);
        assert_eq!(decode(&[0xc5]).unwrap().opcode, Opcode::Push);
        assert_eq!(decode(&[0xd9]).unwrap().opcode, Opcode::Reti);
        assert_eq!(decode(&[0xf5]).unwrap().to_string(), "push af");
        assert_eq!(decode(&[0xff]).unwrap().lhs, Some(Operand::Vector(0x38)));
        assert_eq!(decode(&[0x32]).unwrap().to_string(), "ld (hl-), a");
        assert_eq!(decode(&[0x10, 0x00]).unwrap().length, 2);
    }

    #[test]
    fn prefixed_instructions_report_their_own_cycles() {
        let instruction = decode(&[0xcb, 0x7e]).unwrap();
        assert_eq!(instruction.opcode, Opcode::Bit);
        assert_eq!(instruction.lhs, Some(Operand::Bit(7)));
        assert_eq!(instruction.cycles, (8, None));
        assert_eq!(instruction.length, 2);
        assert!(instruction.is_prefixed());

        let instruction = decode(&[0xcb, 0x37]).unwrap();
        assert_eq!(instruction.to_string(), "swap a");
        assert_eq!(instruction.cycles, (4, None));

        assert_eq!(decode(&[0xcb, 0xc6]).unwrap().cycles, (12, None));
    }

    #[test]
    fn disassembly_uses_assembler_syntax() {
        let cases: [(&[u8], &str); 9] = [
            (&[0xc9], "ret"),
            (&[0xe9], "jp hl"),
            (&[0xef], "rst $28"),
            (&[0xe2], "ld (c), a"),
            (&[0xe0, 0x80], "ldh ($80), a"),
            (&[0xfa, 0x00, 0xc2], "ld a, ($c200)"),
            (&[0xf8, 0x08], "ld hl, sp+8"),
            (&[0x18, 0x05], "jr +5"),
            (&[0xcb, 0x7e], "bit 7, (hl)"),
        ];

        for (program, text) in cases {
            assert_eq!(decode(program).unwrap().to_string(), text);
        }
    }
}
