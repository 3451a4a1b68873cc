use crate::error::GbError;
use crate::hardware::Hardware;
use crate::lr35902::sm83::{Register, Register16};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const ZERO       = 0b1000_0000;
        const SUBTRACT   = 0b0100_0000;
        const HALF_CARRY = 0b0010_0000;
        const CARRY      = 0b0001_0000;
    }
}

/// The register file. ALU operations publish their flags here and hand the
/// result back; storing it is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Default for Registers {
    fn default() -> Registers {
        // State the boot ROM leaves behind on a DMG
        Registers {
            a: 0x01,
            f: Flags::from_bits_truncate(0xb0),
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xd8,
            h: 0x01,
            l: 0x4d,
            sp: 0xfffe,
            pc: 0x0100,
        }
    }
}

impl Registers {
    pub fn read_register(&self, register: &Register) -> u8 {
        match register {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
        }
    }

    pub fn write_register(&mut self, register: &Register, data: u8) {
        match register {
            Register::A => self.a = data,
            Register::B => self.b = data,
            Register::C => self.c = data,
            Register::D => self.d = data,
            Register::E => self.e = data,
            Register::H => self.h = data,
            Register::L => self.l = data,
        }
    }

    pub fn read_register16(&self, register: &Register16) -> u16 {
        match register {
            Register16::AF => u16::from_be_bytes([self.a, self.f.bits()]),
            Register16::BC => u16::from_be_bytes([self.b, self.c]),
            Register16::DE => u16::from_be_bytes([self.d, self.e]),
            Register16::HL => u16::from_be_bytes([self.h, self.l]),
            Register16::SP => self.sp,
            Register16::PC => self.pc,
        }
    }

    pub fn write_register16(&mut self, register: &Register16, value: u16) {
        let [high, low] = value.to_be_bytes();
        match register {
            Register16::AF => {
                self.a = high;
                // Low nibble of F does not exist in hardware
                self.f = Flags::from_bits_truncate(low);
            }
            Register16::BC => {
                self.b = high;
                self.c = low;
            }
            Register16::DE => {
                self.d = high;
                self.e = low;
            }
            Register16::HL => {
                self.h = high;
                self.l = low;
            }
            Register16::SP => self.sp = value,
            Register16::PC => self.pc = value,
        }
    }

    #[inline]
    pub fn read_flag(&self, flag: Flags) -> bool {
        self.f.contains(flag)
    }

    #[inline]
    pub fn update_flag(&mut self, flag: Flags, value: bool) {
        self.f.set(flag, value);
    }

    fn set_flags(&mut self, zero: bool, subtract: bool, half_carry: bool, carry: bool) {
        self.update_flag(Flags::ZERO, zero);
        self.update_flag(Flags::SUBTRACT, subtract);
        self.update_flag(Flags::HALF_CARRY, half_carry);
        self.update_flag(Flags::CARRY, carry);
    }

    pub fn add(&mut self, x: u8) -> u8 {
        self.add_with_carry(x, false)
    }

    pub fn adc(&mut self, x: u8) -> u8 {
        let carry = self.read_flag(Flags::CARRY);
        self.add_with_carry(x, carry)
    }

    fn add_with_carry(&mut self, x: u8, carry: bool) -> u8 {
        let carry = carry as u16;
        let sum = self.a as u16 + x as u16 + carry;
        let half = (self.a & 0x0f) as u16 + (x & 0x0f) as u16 + carry;
        let result = sum as u8;

        self.set_flags(result == 0, false, half > 0x0f, sum > 0xff);
        result
    }

    pub fn sub(&mut self, x: u8) -> u8 {
        self.sub_with_borrow(x, false)
    }

    pub fn sbc(&mut self, x: u8) -> u8 {
        let carry = self.read_flag(Flags::CARRY);
        self.sub_with_borrow(x, carry)
    }

    /// Same flags as `sub`, the accumulator stays untouched.
    pub fn cp(&mut self, x: u8) {
        self.sub(x);
    }

    fn sub_with_borrow(&mut self, x: u8, borrow: bool) -> u8 {
        let borrow = borrow as i16;
        let difference = self.a as i16 - x as i16 - borrow;
        let half = (self.a & 0x0f) as i16 - (x & 0x0f) as i16 - borrow;
        let result = difference as u8;

        self.set_flags(result == 0, true, half < 0, difference < 0);
        result
    }

    pub fn and(&mut self, x: u8) -> u8 {
        let result = self.a & x;
        self.set_flags(result == 0, false, true, false);
        result
    }

    pub fn or(&mut self, x: u8) -> u8 {
        let result = self.a | x;
        self.set_flags(result == 0, false, false, false);
        result
    }

    pub fn xor(&mut self, x: u8) -> u8 {
        let result = self.a ^ x;
        self.set_flags(result == 0, false, false, false);
        result
    }

    /// 8-bit increment, carry is preserved.
    pub fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.update_flag(Flags::ZERO, result == 0);
        self.update_flag(Flags::SUBTRACT, false);
        self.update_flag(Flags::HALF_CARRY, (value & 0x0f) == 0x0f);
        result
    }

    /// 8-bit decrement, carry is preserved.
    pub fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.update_flag(Flags::ZERO, result == 0);
        self.update_flag(Flags::SUBTRACT, true);
        self.update_flag(Flags::HALF_CARRY, (value & 0x0f) == 0);
        result
    }

    pub fn increment16(&mut self, register: &Register16) {
        let value = self.read_register16(register);
        self.write_register16(register, value.wrapping_add(1));
    }

    pub fn decrement16(&mut self, register: &Register16) {
        let value = self.read_register16(register);
        self.write_register16(register, value.wrapping_sub(1));
    }

    /// `add hl, r16`: carries out of bit 11 and bit 15, zero is preserved.
    pub fn add_hl(&mut self, x: u16) -> u16 {
        let hl = self.read_register16(&Register16::HL);
        let (result, carry) = hl.overflowing_add(x);

        self.update_flag(Flags::SUBTRACT, false);
        self.update_flag(Flags::HALF_CARRY, (hl & 0x0fff) + (x & 0x0fff) > 0x0fff);
        self.update_flag(Flags::CARRY, carry);
        result
    }

    /// `sp + e8` as used by `add sp, e8` and `ld hl, sp+e8`. Flags come from
    /// the unsigned addition of the low byte.
    pub fn add_sp(&mut self, offset: i8) -> u16 {
        let sp = self.sp;
        let unsigned = offset as u8 as u16;

        self.set_flags(
            false,
            false,
            (sp & 0x000f) + (unsigned & 0x000f) > 0x000f,
            (sp & 0x00ff) + unsigned > 0x00ff,
        );
        sp.wrapping_add_signed(offset as i16)
    }

    /// Adjusts A to packed BCD after an addition or subtraction.
    pub fn daa(&mut self) -> u8 {
        let mut a = self.a;
        let mut carry = self.read_flag(Flags::CARRY);

        if !self.read_flag(Flags::SUBTRACT) {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.read_flag(Flags::HALF_CARRY) || (a & 0x0f) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.read_flag(Flags::HALF_CARRY) {
                a = a.wrapping_sub(0x06);
            }
        }

        self.update_flag(Flags::ZERO, a == 0);
        self.update_flag(Flags::HALF_CARRY, false);
        self.update_flag(Flags::CARRY, carry);
        a
    }

    pub fn cpl(&mut self) -> u8 {
        self.update_flag(Flags::SUBTRACT, true);
        self.update_flag(Flags::HALF_CARRY, true);
        !self.a
    }

    pub fn scf(&mut self) {
        self.update_flag(Flags::SUBTRACT, false);
        self.update_flag(Flags::HALF_CARRY, false);
        self.update_flag(Flags::CARRY, true);
    }

    pub fn ccf(&mut self) {
        let carry = self.read_flag(Flags::CARRY);
        self.update_flag(Flags::SUBTRACT, false);
        self.update_flag(Flags::HALF_CARRY, false);
        self.update_flag(Flags::CARRY, !carry);
    }

    fn shifted(&mut self, result: u8, carry: bool) -> u8 {
        self.set_flags(result == 0, false, false, carry);
        result
    }

    pub fn rlc(&mut self, value: u8) -> u8 {
        self.shifted(value.rotate_left(1), value & 0x80 != 0)
    }

    pub fn rrc(&mut self, value: u8) -> u8 {
        self.shifted(value.rotate_right(1), value & 0x01 != 0)
    }

    pub fn rl(&mut self, value: u8) -> u8 {
        let carry = self.read_flag(Flags::CARRY) as u8;
        self.shifted((value << 1) | carry, value & 0x80 != 0)
    }

    pub fn rr(&mut self, value: u8) -> u8 {
        let carry = self.read_flag(Flags::CARRY) as u8;
        self.shifted((value >> 1) | (carry << 7), value & 0x01 != 0)
    }

    pub fn sla(&mut self, value: u8) -> u8 {
        self.shifted(value << 1, value & 0x80 != 0)
    }

    pub fn sra(&mut self, value: u8) -> u8 {
        self.shifted((value >> 1) | (value & 0x80), value & 0x01 != 0)
    }

    pub fn srl(&mut self, value: u8) -> u8 {
        self.shifted(value >> 1, value & 0x01 != 0)
    }

    pub fn swap(&mut self, value: u8) -> u8 {
        self.shifted(value.rotate_left(4), false)
    }

    pub fn bit(&mut self, bit: u8, value: u8) {
        self.update_flag(Flags::ZERO, value & (1 << bit) == 0);
        self.update_flag(Flags::SUBTRACT, false);
        self.update_flag(Flags::HALF_CARRY, true);
    }

    /// Writes the high byte to SP-1 and the low byte to SP-2.
    pub fn push_word(&mut self, hw: &mut Hardware, value: u16) -> Result<(), GbError> {
        let [high, low] = value.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        hw.write(self.sp, high)?;
        self.sp = self.sp.wrapping_sub(1);
        hw.write(self.sp, low)?;
        Ok(())
    }

    pub fn pop_word(&mut self, hw: &mut Hardware) -> Result<u16, GbError> {
        let low = hw.read(self.sp)?;
        self.sp = self.sp.wrapping_add(1);
        let high = hw.read(self.sp)?;
        self.sp = self.sp.wrapping_add(1);
        Ok(u16::from_be_bytes([high, low]))
    }

    pub fn push(&mut self, hw: &mut Hardware, register: &Register16) -> Result<(), GbError> {
        let value = self.read_register16(register);
        self.push_word(hw, value)
    }

    pub fn pop(&mut self, hw: &mut Hardware, register: &Register16) -> Result<(), GbError> {
        let value = self.pop_word(hw)?;
        self.write_register16(register, value);
        Ok(())
    }
}
