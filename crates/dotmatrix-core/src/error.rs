use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions raised by the instruction dispatcher.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// An illegal opcode executed while the CPU is configured to lock up on
    /// them, as the real hardware does.
    #[error("illegal opcode {opcode:#04X} at PC={pc:#06X} locked the CPU")]
    IllegalOpcode { opcode: u8, pc: u16 },
}

/// Problems with a ROM image handed to the memory map.
#[derive(Error, Debug)]
pub enum RomError {
    #[error("ROM image is empty")]
    Empty,

    #[error("ROM image is {len} bytes, larger than the 32 KiB flat ROM area")]
    TooLarge { len: usize },

    #[error("failed to read ROM {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
