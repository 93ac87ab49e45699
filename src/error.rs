use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::FaultPolicy;

/// Everything that can go wrong while setting up or running the emulator.
///
/// The first group are startup errors and always abort before any cycle
/// runs. The second group are faults raised by a single instruction; the
/// scheduler decides per [`FaultPolicy`] whether to keep going.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read ROM {}: {source}", path.display())]
    RomRead { path: PathBuf, source: io::Error },

    #[error("ROM is {size} bytes but at most {max} bytes fit above 0x200")]
    RomTooLarge { size: usize, max: usize },

    #[error("ROM is empty")]
    EmptyRom,

    #[error("unable to read config {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("unable to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unable to build logger: {0}")]
    Logger(String),

    #[error("call stack overflow pushing return address {addr:#05x}")]
    StackOverflow { addr: u16 },

    #[error("call stack underflow on return")]
    StackUnderflow,

    #[error("unknown opcode {opcode:#06x}")]
    UnknownOpcode { opcode: u16 },

    #[error("memory access out of range at {addr:#06x}")]
    AddressOutOfRange { addr: usize },

    #[error("write to read-only font memory at {addr:#05x}")]
    ReadOnlyMemory { addr: usize },

    #[error("program counter {pc:#05x} is outside the loaded program")]
    FetchOutOfRange { pc: u16 },

    #[error("program counter {pc:#05x} is not on an instruction boundary")]
    MisalignedFetch { pc: u16 },
}

impl Error {
    /// True for faults raised by executing an instruction, as opposed to
    /// startup errors.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Error::StackOverflow { .. }
                | Error::StackUnderflow
                | Error::UnknownOpcode { .. }
                | Error::AddressOutOfRange { .. }
                | Error::ReadOnlyMemory { .. }
                | Error::FetchOutOfRange { .. }
                | Error::MisalignedFetch { .. }
        )
    }

    /// Whether the scheduler has to stop on this error.
    pub fn is_fatal(&self, policy: FaultPolicy) -> bool {
        match self {
            // there is no next instruction to continue at
            Error::FetchOutOfRange { .. } | Error::MisalignedFetch { .. } => true,
            e if e.is_fault() => policy == FaultPolicy::Strict,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let overflow = Error::StackOverflow { addr: 0x202 };
        assert!(overflow.is_fault());
        assert!(!overflow.is_fatal(FaultPolicy::Permissive));
        assert!(overflow.is_fatal(FaultPolicy::Strict));

        let unknown = Error::UnknownOpcode { opcode: 0x8FFF };
        assert!(!unknown.is_fatal(FaultPolicy::Permissive));
        assert!(unknown.is_fatal(FaultPolicy::Strict));

        let fetch = Error::FetchOutOfRange { pc: 0x300 };
        assert!(fetch.is_fatal(FaultPolicy::Permissive));

        let misaligned = Error::MisalignedFetch { pc: 0x201 };
        assert!(misaligned.is_fault());
        assert!(misaligned.is_fatal(FaultPolicy::Permissive));

        assert!(!Error::EmptyRom.is_fault());
        assert!(Error::EmptyRom.is_fatal(FaultPolicy::Permissive));
    }

    #[test]
    fn messages() {
        assert_eq!(
            Error::UnknownOpcode { opcode: 0xE0FF }.to_string(),
            "unknown opcode 0xe0ff"
        );
        assert_eq!(
            Error::FetchOutOfRange { pc: 0x204 }.to_string(),
            "program counter 0x204 is outside the loaded program"
        );
    }
}
