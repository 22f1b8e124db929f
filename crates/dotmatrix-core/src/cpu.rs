use log::{debug, log_enabled, trace, warn};

use crate::alu;
use crate::bus::{Bus, REG_IE, REG_IF};
use crate::error::CpuError;
use crate::registers::{FLAG_C, FLAG_Z, Registers};

// Operand index of the (HL) memory operand in the 3-bit register encoding.
const HL_OPERAND: u8 = 6;

/// Behavior switches for the dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuConfig {
    /// Treat the eleven illegal opcodes as a hard lock-up and return
    /// [`CpuError::IllegalOpcode`] instead of logging and continuing.
    pub lock_on_illegal: bool,
}

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    pub halted: bool,
    /// Total T-cycles executed since construction.
    pub cycles: u64,
    config: CpuConfig,
}

impl Cpu {
    /// Create a CPU in the post-boot register state.
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            regs: Registers::new(),
            ime: false,
            halted: false,
            cycles: 0,
            config,
        }
    }

    pub fn config(&self) -> CpuConfig {
        self.config
    }

    /// Called when the PPU enters V-Blank. Only the master enable is
    /// modeled; there is no vectoring to an interrupt handler.
    pub fn request_interrupts(&mut self) {
        self.ime = true;
    }

    #[inline(always)]
    fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let val = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    #[inline(always)]
    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        (hi << 8) | lo
    }

    fn push_stack<B: Bus>(&mut self, bus: &mut B, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, val as u8);
    }

    fn pop_stack<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn read_reg<B: Bus>(&mut self, bus: &mut B, index: u8) -> u8 {
        if index == HL_OPERAND {
            bus.read(self.regs.hl())
        } else {
            self.regs.get8(index)
        }
    }

    fn write_reg<B: Bus>(&mut self, bus: &mut B, index: u8, val: u8) {
        if index == HL_OPERAND {
            bus.write(self.regs.hl(), val);
        } else {
            self.regs.set8(index, val);
        }
    }

    /// 16-bit register by its 2-bit encoding in the LD/INC/DEC/ADD group.
    fn reg16(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn set_reg16(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.regs.set_hl(val),
            _ => self.regs.sp = val,
        }
    }

    /// NZ, Z, NC, C by the 2-bit condition encoding.
    fn condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => self.regs.f() & FLAG_Z == 0,
            1 => self.regs.f() & FLAG_Z != 0,
            2 => self.regs.f() & FLAG_C == 0,
            _ => self.regs.f() & FLAG_C != 0,
        }
    }

    /// ADD/ADC/SUB/SBC/AND/XOR/OR/CP against A by the 3-bit op encoding.
    fn alu_a(&mut self, op: u8, val: u8) {
        let r = &mut self.regs;
        match op & 0x07 {
            0 => r.a = r.add(val),
            1 => r.a = r.adc(val),
            2 => r.a = r.sub(val),
            3 => r.a = r.sbc(val),
            4 => r.a = r.and(val),
            5 => r.a = r.xor(val),
            6 => r.a = r.or(val),
            _ => r.cp(val),
        }
    }

    /// Execute one CB-prefixed opcode, returning the cycles for the whole
    /// two-byte instruction.
    fn handle_cb<B: Bus>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let r = opcode & 0x07;
        let bit = (opcode >> 3) & 0x07;
        let val = self.read_reg(bus, r);
        match opcode >> 6 {
            0 => {
                let res = match bit {
                    0 => self.regs.rlc(val),
                    1 => self.regs.rrc(val),
                    2 => self.regs.rl(val),
                    3 => self.regs.rr(val),
                    4 => self.regs.sla(val),
                    5 => self.regs.sra(val),
                    6 => self.regs.swap(val),
                    _ => self.regs.srl(val),
                };
                self.write_reg(bus, r, res);
            }
            1 => {
                self.regs.bit(bit, val);
                // BIT n,(HL) only reads memory
                return if r == HL_OPERAND { 12 } else { 8 };
            }
            2 => self.write_reg(bus, r, alu::res(bit, val)),
            _ => self.write_reg(bus, r, alu::set(bit, val)),
        }
        if r == HL_OPERAND { 16 } else { 8 }
    }

    fn illegal(&self, opcode: u8, pc: u16) -> Result<u32, CpuError> {
        if self.config.lock_on_illegal {
            return Err(CpuError::IllegalOpcode { opcode, pc });
        }
        warn!("illegal opcode {opcode:02X} at PC={pc:04X}; continuing as NOP");
        Ok(4)
    }

    /// Execute one instruction and return the T-cycles it consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        if self.halted {
            let pending = bus.read(REG_IF) & bus.read(REG_IE) & 0x1F;
            if pending == 0 {
                self.cycles += 4;
                return Ok(4);
            }
            debug!("HALT released by pending interrupt {pending:02X}");
            self.halted = false;
        }

        let pc = self.regs.pc;
        let opcode = self.fetch8(bus);
        if log_enabled!(log::Level::Trace) {
            trace!("{pc:04X}: {opcode:02X}  {}", self.regs.debug_state());
        }

        let cycles = match opcode {
            0x00 => 4,
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(bus);
                self.set_reg16(opcode >> 4, val);
                12
            }
            0x02 => {
                bus.write(self.regs.bc(), self.regs.a);
                8
            }
            0x12 => {
                bus.write(self.regs.de(), self.regs.a);
                8
            }
            0x22 => {
                let addr = self.regs.hl();
                bus.write(addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_add(1));
                8
            }
            0x32 => {
                let addr = self.regs.hl();
                bus.write(addr, self.regs.a);
                self.regs.set_hl(addr.wrapping_sub(1));
                8
            }
            0x0A => {
                self.regs.a = bus.read(self.regs.bc());
                8
            }
            0x1A => {
                self.regs.a = bus.read(self.regs.de());
                8
            }
            0x2A => {
                let addr = self.regs.hl();
                self.regs.a = bus.read(addr);
                self.regs.set_hl(addr.wrapping_add(1));
                8
            }
            0x3A => {
                let addr = self.regs.hl();
                self.regs.a = bus.read(addr);
                self.regs.set_hl(addr.wrapping_sub(1));
                8
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let idx = opcode >> 4;
                self.set_reg16(idx, self.reg16(idx).wrapping_add(1));
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let idx = opcode >> 4;
                self.set_reg16(idx, self.reg16(idx).wrapping_sub(1));
                8
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.regs.inc(val);
                self.write_reg(bus, r, res);
                if r == HL_OPERAND { 12 } else { 4 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(bus, r);
                let res = self.regs.dec(val);
                self.write_reg(bus, r, res);
                if r == HL_OPERAND { 12 } else { 4 }
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = (opcode >> 3) & 0x07;
                let val = self.fetch8(bus);
                self.write_reg(bus, r, val);
                if r == HL_OPERAND { 12 } else { 8 }
            }
            0x07 | 0x0F | 0x17 | 0x1F => {
                self.regs.rotate_a((opcode >> 3) & 0x03);
                4
            }
            0x08 => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.sp as u8);
                bus.write(addr.wrapping_add(1), (self.regs.sp >> 8) as u8);
                20
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.reg16(opcode >> 4);
                self.regs.add_hl(val);
                8
            }
            0x10 => {
                // STOP is followed by a padding byte.
                let _ = self.fetch8(bus);
                debug!("STOP at PC={pc:04X}");
                4
            }
            0x18 => {
                let offset = self.fetch8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
                12
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(bus) as i8;
                if self.condition(opcode) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
                    12
                } else {
                    8
                }
            }
            0x27 => {
                self.regs.daa();
                4
            }
            0x2F => {
                self.regs.cpl();
                4
            }
            0x37 => {
                self.regs.scf();
                4
            }
            0x3F => {
                self.regs.ccf();
                4
            }
            0x76 => {
                self.halted = true;
                debug!("HALT at PC={pc:04X}");
                4
            }
            0x40..=0x75 | 0x77..=0x7F => {
                let dest = (opcode >> 3) & 0x07;
                let src = opcode & 0x07;
                let val = self.read_reg(bus, src);
                self.write_reg(bus, dest, val);
                if dest == HL_OPERAND || src == HL_OPERAND {
                    8
                } else {
                    4
                }
            }
            0x80..=0xBF => {
                let src = opcode & 0x07;
                let val = self.read_reg(bus, src);
                self.alu_a(opcode >> 3, val);
                if src == HL_OPERAND { 8 } else { 4 }
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch8(bus);
                self.alu_a(opcode >> 3, val);
                8
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition(opcode) {
                    self.regs.pc = self.pop_stack(bus);
                    20
                } else {
                    8
                }
            }
            0xC9 => {
                self.regs.pc = self.pop_stack(bus);
                16
            }
            0xD9 => {
                self.regs.pc = self.pop_stack(bus);
                self.ime = true;
                16
            }
            0xC1 | 0xD1 | 0xE1 => {
                let val = self.pop_stack(bus);
                self.set_reg16((opcode >> 4) & 0x03, val);
                12
            }
            0xF1 => {
                let val = self.pop_stack(bus);
                self.regs.set_af(val);
                12
            }
            0xC5 | 0xD5 | 0xE5 => {
                let val = self.reg16((opcode >> 4) & 0x03);
                self.push_stack(bus, val);
                16
            }
            0xF5 => {
                let val = self.regs.af();
                self.push_stack(bus, val);
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(bus);
                if self.condition(opcode) {
                    self.regs.pc = addr;
                    16
                } else {
                    12
                }
            }
            0xC3 => {
                self.regs.pc = self.fetch16(bus);
                16
            }
            0xE9 => {
                self.regs.pc = self.regs.hl();
                4
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(bus);
                if self.condition(opcode) {
                    self.push_stack(bus, self.regs.pc);
                    self.regs.pc = addr;
                    24
                } else {
                    12
                }
            }
            0xCD => {
                let addr = self.fetch16(bus);
                self.push_stack(bus, self.regs.pc);
                self.regs.pc = addr;
                24
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.push_stack(bus, self.regs.pc);
                self.regs.pc = (opcode & 0x38) as u16;
                16
            }
            0xCB => {
                let op = self.fetch8(bus);
                self.handle_cb(op, bus)
            }
            0xE0 => {
                let offset = self.fetch8(bus);
                bus.write(0xFF00 | offset as u16, self.regs.a);
                12
            }
            0xF0 => {
                let offset = self.fetch8(bus);
                self.regs.a = bus.read(0xFF00 | offset as u16);
                12
            }
            0xE2 => {
                bus.write(0xFF00 | self.regs.c as u16, self.regs.a);
                8
            }
            0xF2 => {
                self.regs.a = bus.read(0xFF00 | self.regs.c as u16);
                8
            }
            0xEA => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.regs.a);
                16
            }
            0xFA => {
                let addr = self.fetch16(bus);
                self.regs.a = bus.read(addr);
                16
            }
            0xE8 => {
                let offset = self.fetch8(bus);
                self.regs.sp = self.regs.add_sp_signed(offset);
                16
            }
            0xF8 => {
                let offset = self.fetch8(bus);
                let val = self.regs.add_sp_signed(offset);
                self.regs.set_hl(val);
                12
            }
            0xF9 => {
                self.regs.sp = self.regs.hl();
                8
            }
            0xF3 => {
                self.ime = false;
                4
            }
            0xFB => {
                self.ime = true;
                4
            }
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                self.illegal(opcode, pc)?
            }
        };

        self.cycles += cycles as u64;
        Ok(cycles)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
