use std::path::Path;

use log::debug;

use crate::error::RomError;

const MEMORY_SIZE: usize = 0x10000;
const ROM_AREA_SIZE: usize = 0x8000;

// Memory-mapped registers (gbdev.io/pandocs/Hardware_Reg_List.html)
pub const REG_JOYP: u16 = 0xFF00;
pub const REG_SB: u16 = 0xFF01;
pub const REG_SC: u16 = 0xFF02;
pub const REG_DIV: u16 = 0xFF04;
pub const REG_IF: u16 = 0xFF0F;
pub const REG_LCDC: u16 = 0xFF40;
pub const REG_STAT: u16 = 0xFF41;
pub const REG_SCY: u16 = 0xFF42;
pub const REG_SCX: u16 = 0xFF43;
pub const REG_LY: u16 = 0xFF44;
pub const REG_LYC: u16 = 0xFF45;
pub const REG_BGP: u16 = 0xFF47;
pub const REG_IE: u16 = 0xFFFF;

/// The address space as seen by the CPU and the PPU.
///
/// Both operations are total: any side effect of touching a memory-mapped
/// register belongs to the implementation.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, val: u8);

    /// Advance bus-owned clocks by `cycles` T-cycles.
    fn tick(&mut self, _cycles: u32) {}
}

/// Flat 64 KiB memory map with the handful of I/O registers that need
/// side effects.
pub struct Mmu {
    memory: Box<[u8; MEMORY_SIZE]>,
    /// 16-bit internal divider counter. DIV is the upper 8 bits.
    div: u16,
    serial_out: Vec<u8>,
}

impl Mmu {
    pub fn new() -> Self {
        let mut mmu = Self {
            memory: Box::new([0; MEMORY_SIZE]),
            div: 0,
            serial_out: Vec::new(),
        };
        mmu.apply_boot_state();
        mmu
    }

    /// Create a memory map with `rom` mapped at 0x0000.
    pub fn from_rom(rom: &[u8]) -> Result<Self, RomError> {
        let mut mmu = Self::new();
        mmu.load_rom(rom)?;
        Ok(mmu)
    }

    /// I/O register values left behind by the DMG boot ROM.
    fn apply_boot_state(&mut self) {
        self.memory[REG_JOYP as usize] = 0xCF;
        self.memory[REG_SC as usize] = 0x7E;
        self.memory[REG_IF as usize] = 0xE1;
        self.memory[REG_LCDC as usize] = 0x91;
        self.memory[REG_STAT as usize] = 0x85;
        self.memory[REG_BGP as usize] = 0xFC;
    }

    /// Copy a ROM image into the flat ROM area starting at 0x0000.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), RomError> {
        if rom.is_empty() {
            return Err(RomError::Empty);
        }
        if rom.len() > ROM_AREA_SIZE {
            return Err(RomError::TooLarge { len: rom.len() });
        }
        self.memory[..rom.len()].copy_from_slice(rom);
        debug!("Loaded {} byte ROM", rom.len());
        Ok(())
    }

    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RomError> {
        let path = path.as_ref();
        let rom = std::fs::read(path).map_err(|source| RomError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_rom(&rom)
    }

    /// Bytes shifted out over the serial port so far.
    pub fn peek_serial(&self) -> &[u8] {
        &self.serial_out
    }

    pub fn take_serial(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.serial_out)
    }
}

impl Bus for Mmu {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            // No buttons are ever pressed; unselected lines read high.
            REG_JOYP => self.memory[addr as usize] | 0xCF,
            REG_DIV => (self.div >> 8) as u8,
            _ => self.memory[addr as usize],
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            // Only the two select lines are writable.
            REG_JOYP => {
                let cur = self.memory[addr as usize];
                self.memory[addr as usize] = (cur & 0xCF) | (val & 0x30);
            }
            REG_SC => {
                // Internal-clock transfers complete instantly; there is no
                // link partner so the incoming byte is 0xFF.
                if val & 0x81 == 0x81 {
                    let byte = self.memory[REG_SB as usize];
                    self.serial_out.push(byte);
                    self.memory[REG_SB as usize] = 0xFF;
                    self.memory[addr as usize] = (val & 0x7F) | 0x7E;
                } else {
                    self.memory[addr as usize] = val | 0x7E;
                }
            }
            REG_DIV => self.div = 0,
            // Upper three bits are unused and read back as 1.
            REG_IF => self.memory[addr as usize] = val | 0xE0,
            _ => self.memory[addr as usize] = val,
        }
    }

    fn tick(&mut self, cycles: u32) {
        self.div = self.div.wrapping_add(cycles as u16);
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
