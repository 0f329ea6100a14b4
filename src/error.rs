use std::path::PathBuf;

use crate::memory::TypeAddr;

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("unable to read program from {path:?}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program is too large ({size} bytes), max size is {max} bytes")]
    ProgramTooLarge { size: usize, max: usize },

    #[error("memory access out of bounds at address {address:#06X}")]
    AddressOutOfRange { address: usize },

    #[error("call stack overflow at pc {pc:#06X}")]
    StackOverflow { pc: TypeAddr },

    #[error("return with empty call stack at pc {pc:#06X}")]
    StackUnderflow { pc: TypeAddr },
}
