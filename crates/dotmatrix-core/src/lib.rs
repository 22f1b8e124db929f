//! Game Boy (DMG) CPU and background PPU emulation core.
//!
//! This crate contains the platform-agnostic emulator logic. Frontends drive
//! the core through the [`gameboy`] facade: execute one instruction, feed the
//! elapsed cycles to the PPU, and read the frame buffer once a frame has been
//! produced.

/// Arithmetic, rotate/shift and bit primitives with their flag semantics.
pub mod alu;

/// Memory bus contract and the flat 64 KiB memory map.
pub mod bus;

/// LR35902 instruction dispatcher.
pub mod cpu;

/// Error types surfaced by the core.
pub mod error;

/// High-level facade that wires the CPU, PPU and bus into a single machine.
pub mod gameboy;

/// Pixel Processing Unit (PPU) mode state machine and background renderer.
pub mod ppu;

/// Register file and flag bits.
pub mod registers;

pub use bus::{Bus, Mmu};
pub use cpu::{Cpu, CpuConfig};
pub use error::{CpuError, RomError};
pub use gameboy::GameBoy;
pub use ppu::{FrameBuffer, Mode, Palette, Ppu, PpuEvent, Rgb};
pub use registers::Registers;
