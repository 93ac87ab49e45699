//! The CHIP-8's 4K of RAM and its 16-entry call stack.
//!
//! Memory map:
//! * 0x000-0x04F  built-in hex font, 16 glyphs of 5 bytes each (read-only)
//! * 0x050-0x1FF  interpreter area, unused
//! * 0x200-0xFFF  program image and program data
use std::ops::{Index, IndexMut};

use crate::error::Error;

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: usize = 0x200;
pub const FONT_BASE: usize = 0x000;
pub const NUM_BYTES_IN_FONT_CHAR: u8 = 5;
pub const STACK_DEPTH: usize = 16;

const FONT_END: usize = FONT_BASE + FONT_SET.len();

pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
    program_end: usize, // one past the last byte of the loaded program
}

impl Memory {
    /// Zeroed memory with the font table in place and no program loaded.
    pub fn new() -> Self {
        let mut bytes = [0; MEMORY_SIZE];
        bytes[FONT_BASE..FONT_END].copy_from_slice(&FONT_SET);

        Memory {
            bytes,
            program_end: PROGRAM_START,
        }
    }

    /// Copy a program image in at 0x200. Anything previously loaded is
    /// wiped first.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), Error> {
        let max = MEMORY_SIZE - PROGRAM_START;
        if rom.is_empty() {
            return Err(Error::EmptyRom);
        }
        if rom.len() > max {
            return Err(Error::RomTooLarge {
                size: rom.len(),
                max,
            });
        }

        self.bytes[PROGRAM_START..].iter_mut().for_each(|b| *b = 0);
        self.program_end = PROGRAM_START + rom.len();
        self.bytes[PROGRAM_START..self.program_end].copy_from_slice(rom);
        Ok(())
    }

    pub fn program_end(&self) -> usize {
        self.program_end
    }

    /// Read the big-endian instruction word at `pc`. Only even addresses
    /// inside the loaded program image can be fetched.
    pub fn fetch(&self, pc: u16) -> Result<u16, Error> {
        let pc_usize = pc as usize;
        if pc_usize < PROGRAM_START || pc_usize + 1 >= self.program_end {
            return Err(Error::FetchOutOfRange { pc });
        }
        if pc % 2 != 0 {
            return Err(Error::MisalignedFetch { pc });
        }
        Ok(u16::from_be_bytes([
            self.bytes[pc_usize],
            self.bytes[pc_usize + 1],
        ]))
    }

    /// Borrow `len` bytes starting at `addr`, or fail without reading
    /// anything if the range runs past the end of memory.
    pub fn read(&self, addr: usize, len: usize) -> Result<&[u8], Error> {
        let end = Self::checked_end(addr, len)?;
        Ok(&self.bytes[addr..end])
    }

    /// Write `data` starting at `addr`. The whole range is validated before
    /// any byte is written.
    pub fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), Error> {
        let end = Self::checked_end(addr, data.len())?;
        if !data.is_empty() && addr < FONT_END {
            return Err(Error::ReadOnlyMemory { addr });
        }
        self.bytes[addr..end].copy_from_slice(data);
        Ok(())
    }

    fn checked_end(addr: usize, len: usize) -> Result<usize, Error> {
        match addr.checked_add(len) {
            Some(end) if end <= MEMORY_SIZE => Ok(end),
            _ => Err(Error::AddressOutOfRange {
                addr: addr.saturating_add(len).saturating_sub(1),
            }),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Memory {
    type Output = u8;

    #[inline]
    fn index(&self, addr: usize) -> &Self::Output {
        &self.bytes[addr]
    }
}

impl IndexMut<usize> for Memory {
    #[inline]
    fn index_mut(&mut self, addr: usize) -> &mut Self::Output {
        &mut self.bytes[addr]
    }
}

/// Return addresses for nested subroutine calls. CHIP 8 can hold up to 16.
pub struct CallStack {
    frames: [u16; STACK_DEPTH],
    sp: usize, // number of occupied frames
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    /// Push a return address. A full stack is left untouched.
    pub fn push(&mut self, addr: u16) -> Result<(), Error> {
        if self.sp == STACK_DEPTH {
            return Err(Error::StackOverflow { addr });
        }
        self.frames[self.sp] = addr;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, Error> {
        if self.sp == 0 {
            return Err(Error::StackUnderflow);
        }
        self.sp -= 1;
        let addr = self.frames[self.sp];
        self.frames[self.sp] = 0;
        Ok(addr)
    }

    pub fn len(&self) -> usize {
        self.sp
    }

    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Occupied frames, bottom of the stack first.
    pub fn as_slice(&self) -> &[u16] {
        &self.frames[..self.sp]
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_has_font_and_zeroed_program_area() {
        let m = Memory::new();
        assert_eq!(m.read(FONT_BASE, 80).unwrap(), &FONT_SET[..]);
        assert!(m.read(PROGRAM_START, MEMORY_SIZE - PROGRAM_START)
            .unwrap()
            .iter()
            .all(|b| *b == 0));
        assert_eq!(m.program_end(), PROGRAM_START);
    }

    #[test]
    fn load_program_sets_bounds() {
        let mut m = Memory::new();
        m.load_program(&[0x60, 0x05, 0x70, 0x03]).unwrap();

        assert_eq!(m.program_end(), 0x204);
        assert_eq!(m.fetch(0x200).unwrap(), 0x6005);
        assert_eq!(m.fetch(0x202).unwrap(), 0x7003);
        assert!(matches!(
            m.fetch(0x204),
            Err(Error::FetchOutOfRange { pc: 0x204 })
        ));
        assert!(matches!(
            m.fetch(0x000),
            Err(Error::FetchOutOfRange { pc: 0 })
        ));
    }

    #[test]
    fn fetch_rejects_odd_addresses() {
        let mut m = Memory::new();
        m.load_program(&[0x60, 0x01, 0xB2, 0x00, 0x60, 0x07]).unwrap();
        assert!(matches!(
            m.fetch(0x201),
            Err(Error::MisalignedFetch { pc: 0x201 })
        ));
        assert!(matches!(
            m.fetch(0x203),
            Err(Error::MisalignedFetch { pc: 0x203 })
        ));
        assert_eq!(m.fetch(0x202).unwrap(), 0xB200);
    }

    #[test]
    fn fetch_rejects_half_instruction() {
        let mut m = Memory::new();
        m.load_program(&[0x60, 0x05, 0x70]).unwrap();
        assert!(m.fetch(0x200).is_ok());
        assert!(m.fetch(0x202).is_err());
    }

    #[test]
    fn reload_wipes_previous_program() {
        let mut m = Memory::new();
        m.load_program(&[0xAA; 8]).unwrap();
        m.load_program(&[0xBB; 2]).unwrap();
        assert_eq!(m[0x201], 0xBB);
        assert_eq!(m[0x202], 0);
    }

    #[test]
    fn load_program_rejects_bad_sizes() {
        let mut m = Memory::new();
        assert!(matches!(m.load_program(&[]), Err(Error::EmptyRom)));

        let too_big = vec![0; MEMORY_SIZE - PROGRAM_START + 1];
        assert!(matches!(
            m.load_program(&too_big),
            Err(Error::RomTooLarge { size: 3585, max: 3584 })
        ));

        let exact = vec![0x12; MEMORY_SIZE - PROGRAM_START];
        assert!(m.load_program(&exact).is_ok());
        assert_eq!(m.program_end(), MEMORY_SIZE);
    }

    #[test]
    fn write_is_all_or_nothing() {
        let mut m = Memory::new();
        assert!(matches!(
            m.write(0xFFE, &[1, 2, 3]),
            Err(Error::AddressOutOfRange { addr: 0x1000 })
        ));
        assert_eq!(m[0xFFE], 0);
        assert_eq!(m[0xFFF], 0);

        m.write(0xFFD, &[1, 2, 3]).unwrap();
        assert_eq!(m.read(0xFFD, 3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn font_is_read_only() {
        let mut m = Memory::new();
        assert!(matches!(
            m.write(0x04F, &[0]),
            Err(Error::ReadOnlyMemory { addr: 0x04F })
        ));
        assert_eq!(m[0x04F], 0x80);
        assert!(m.write(0x050, &[7]).is_ok());
    }

    #[test]
    fn stack_push_pop() {
        let mut s = CallStack::new();
        assert!(s.is_empty());
        s.push(0x202).unwrap();
        s.push(0x304).unwrap();
        assert_eq!(s.as_slice(), &[0x202, 0x304]);
        assert_eq!(s.pop().unwrap(), 0x304);
        assert_eq!(s.pop().unwrap(), 0x202);
        assert!(matches!(s.pop(), Err(Error::StackUnderflow)));
    }

    #[test]
    fn stack_overflow_keeps_frames() {
        let mut s = CallStack::new();
        for i in 0..STACK_DEPTH as u16 {
            s.push(0x200 + i * 2).unwrap();
        }
        let before = s.as_slice().to_vec();

        assert!(matches!(
            s.push(0xABC),
            Err(Error::StackOverflow { addr: 0xABC })
        ));
        assert_eq!(s.len(), STACK_DEPTH);
        assert_eq!(s.as_slice(), &before[..]);
    }
}
