//! ALU primitives.
//!
//! Every operation takes its operand bytes, updates F on the register file
//! and returns the result. None of them touch the bus; the dispatcher owns
//! operand fetch and write-back.

use crate::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Registers};

#[inline(always)]
fn z(res: u8) -> u8 {
    if res == 0 { FLAG_Z } else { 0 }
}

#[inline(always)]
fn when(cond: bool, mask: u8) -> u8 {
    if cond { mask } else { 0 }
}

impl Registers {
    pub fn inc(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.set_f((self.f() & FLAG_C) | z(res) | when(val & 0x0F == 0x0F, FLAG_H));
        res
    }

    pub fn dec(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.set_f((self.f() & FLAG_C) | FLAG_N | z(res) | when(val & 0x0F == 0, FLAG_H));
        res
    }

    /// A + val.
    pub fn add(&mut self, val: u8) -> u8 {
        self.add_with_carry(val, 0)
    }

    /// A + val + C.
    pub fn adc(&mut self, val: u8) -> u8 {
        let carry_in = self.carry_bit();
        self.add_with_carry(val, carry_in)
    }

    fn add_with_carry(&mut self, val: u8, carry_in: u8) -> u8 {
        let sum = self.a as u16 + val as u16 + carry_in as u16;
        let res = sum as u8;
        self.set_f(
            z(res)
                | when((self.a & 0x0F) + (val & 0x0F) + carry_in > 0x0F, FLAG_H)
                | when(sum > 0xFF, FLAG_C),
        );
        res
    }

    /// A - val.
    pub fn sub(&mut self, val: u8) -> u8 {
        self.sub_with_borrow(val, 0)
    }

    /// A - val - C.
    pub fn sbc(&mut self, val: u8) -> u8 {
        let borrow_in = self.carry_bit();
        self.sub_with_borrow(val, borrow_in)
    }

    /// Compare: flags of `A - val`, A is left untouched.
    pub fn cp(&mut self, val: u8) {
        self.sub_with_borrow(val, 0);
    }

    fn sub_with_borrow(&mut self, val: u8, borrow_in: u8) -> u8 {
        let subtrahend = val as u16 + borrow_in as u16;
        let res = (self.a as u16).wrapping_sub(subtrahend) as u8;
        self.set_f(
            FLAG_N
                | z(res)
                | when((self.a & 0x0F) < (val & 0x0F) + borrow_in, FLAG_H)
                | when((self.a as u16) < subtrahend, FLAG_C),
        );
        res
    }

    pub fn and(&mut self, val: u8) -> u8 {
        let res = self.a & val;
        self.set_logic_flags(res, true);
        res
    }

    pub fn xor(&mut self, val: u8) -> u8 {
        let res = self.a ^ val;
        self.set_logic_flags(res, false);
        res
    }

    pub fn or(&mut self, val: u8) -> u8 {
        let res = self.a | val;
        self.set_logic_flags(res, false);
        res
    }

    /// Flags for the boolean ops: Z from the result, N and C cleared, H set
    /// only for AND.
    fn set_logic_flags(&mut self, res: u8, half: bool) {
        self.set_f(z(res) | when(half, FLAG_H));
    }

    fn set_shift_flags(&mut self, res: u8, carry_out: bool) {
        self.set_f(z(res) | when(carry_out, FLAG_C));
    }

    pub fn rlc(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(1);
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    pub fn rrc(&mut self, val: u8) -> u8 {
        let res = val.rotate_right(1);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    pub fn rl(&mut self, val: u8) -> u8 {
        let res = (val << 1) | self.carry_bit();
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    pub fn rr(&mut self, val: u8) -> u8 {
        let res = (val >> 1) | (self.carry_bit() << 7);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    pub fn sla(&mut self, val: u8) -> u8 {
        let res = val << 1;
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    /// Arithmetic shift right; bit 7 is preserved.
    pub fn sra(&mut self, val: u8) -> u8 {
        let res = (val >> 1) | (val & 0x80);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    pub fn srl(&mut self, val: u8) -> u8 {
        let res = val >> 1;
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    pub fn swap(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(4);
        self.set_f(z(res));
        res
    }

    /// Tests bit `n`: Z set when the bit is clear, H set, C kept.
    pub fn bit(&mut self, n: u8, val: u8) {
        self.set_f((self.f() & FLAG_C) | FLAG_H | when(val & (1 << n) == 0, FLAG_Z));
    }

    /// Accumulator rotates (RLCA/RRCA/RLA/RRA) always clear Z.
    pub fn rotate_a(&mut self, op: u8) {
        let res = match op {
            0 => self.rlc(self.a),
            1 => self.rrc(self.a),
            2 => self.rl(self.a),
            _ => self.rr(self.a),
        };
        self.a = res;
        self.set_flag(FLAG_Z, false);
    }

    /// Decimal adjust after a BCD addition or subtraction.
    pub fn daa(&mut self) {
        let mut a = self.a;
        let mut carry = self.carry();
        if !self.subtract() {
            if carry || self.a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.half_carry() || (self.a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.half_carry() {
                a = a.wrapping_sub(0x06);
            }
        }
        self.a = a;
        self.set_f((self.f() & FLAG_N) | z(a) | when(carry, FLAG_C));
    }

    pub fn cpl(&mut self) {
        self.a = !self.a;
        self.set_f((self.f() & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H);
    }

    pub fn scf(&mut self) {
        self.set_f((self.f() & FLAG_Z) | FLAG_C);
    }

    pub fn ccf(&mut self) {
        self.set_f((self.f() & FLAG_Z) | when(!self.carry(), FLAG_C));
    }

    /// HL + val. Z is left untouched.
    pub fn add_hl(&mut self, val: u16) {
        let hl = self.hl();
        self.set_f(
            (self.f() & FLAG_Z)
                | when((hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF, FLAG_H)
                | when(hl as u32 + val as u32 > 0xFFFF, FLAG_C),
        );
        self.set_hl(hl.wrapping_add(val));
    }

    /// SP + signed offset, as used by `ADD SP,e` and `LD HL,SP+e`.
    ///
    /// H and C come from the unsigned low-byte addition; Z and N are cleared.
    pub fn add_sp_signed(&mut self, offset: u8) -> u16 {
        let sp = self.sp;
        let wide = offset as i8 as i16 as u16;
        self.set_f(
            when((sp & 0x0F) + (offset as u16 & 0x0F) > 0x0F, FLAG_H)
                | when((sp & 0xFF) + offset as u16 > 0xFF, FLAG_C),
        );
        sp.wrapping_add(wide)
    }
}

/// Clears bit `n`. Flags are not affected.
#[inline]
pub fn res(n: u8, val: u8) -> u8 {
    val & !(1 << n)
}

/// Sets bit `n`. Flags are not affected.
#[inline]
pub fn set(n: u8, val: u8) -> u8 {
    val | (1 << n)
}
