use crate::error::VmError;

pub type TypeAddr = u16; // in reality u12
type FontBytes = [u8; FONT_SIZE];

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: TypeAddr = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const FONT_START: TypeAddr = 0x050;
pub const FONT_SIZE: usize = 5 * 16;
pub const FONT_GLYPH_SIZE: TypeAddr = 5;
pub const STACK_SIZE: usize = 16;

const DEFAULT_FONT: FontBytes = [
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

/// Flat 4K address space.
///
/// The font set lives in the interpreter area below 0x200 and is written once
/// on construction. Programs are copied in from `PROGRAM_START`.
#[derive(Clone)]
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
    font_base: TypeAddr,
}

impl Memory {
    pub fn new(font_base: TypeAddr) -> Self {
        let highest_base = PROGRAM_START - FONT_SIZE as TypeAddr;
        if font_base > highest_base {
            log::warn!(
                "font base {font_base:#05X} overlaps program area, using {highest_base:#05X}"
            );
        }
        let font_base = font_base.min(highest_base);

        let mut bytes = [0; MEMORY_SIZE];
        let start = font_base as usize;
        bytes[start..start + FONT_SIZE].copy_from_slice(&DEFAULT_FONT);

        Self { bytes, font_base }
    }

    /// Address of the 5 byte glyph for hex digit `digit`
    pub fn glyph_addr(&self, digit: u8) -> TypeAddr {
        self.font_base + FONT_GLYPH_SIZE * digit as TypeAddr
    }

    // every byte of addr..addr + len must exist
    fn range(addr: usize, len: usize) -> Result<std::ops::Range<usize>, VmError> {
        let end = addr + len;
        if end > MEMORY_SIZE {
            // first address that doesn't exist
            return Err(VmError::AddressOutOfRange {
                address: addr.max(MEMORY_SIZE),
            });
        }
        Ok(addr..end)
    }

    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], VmError> {
        Ok(&self.bytes[Self::range(addr, len)?])
    }

    /// Checked as a whole, so a failed write leaves memory untouched
    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], VmError> {
        Ok(&mut self.bytes[Self::range(addr, len)?])
    }

    /// Big-endian instruction at `addr`, None when it runs past the end
    pub fn instruction_at(&self, addr: TypeAddr) -> Option<u16> {
        let addr = addr as usize;
        if addr + 1 >= MEMORY_SIZE {
            return None;
        }
        let (l, r) = (self.bytes[addr], self.bytes[addr + 1]);
        Some(((l as u16) << 8) | r as u16)
    }

    // loads program bytes starting at PROGRAM_START
    pub fn load_rom(&mut self, bytes: &[u8]) -> Result<(), VmError> {
        if bytes.len() > MAX_PROGRAM_SIZE {
            return Err(VmError::ProgramTooLarge {
                size: bytes.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }
        let start_index = PROGRAM_START as usize;
        self.bytes[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Return addresses for CALL / RET, fixed at 16 levels
#[derive(Debug, Clone)]
pub struct Stack {
    addresses: [TypeAddr; STACK_SIZE],
    sp: usize,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            addresses: [0; STACK_SIZE],
            sp: 0,
        }
    }

    /// Fails without touching the stack when all 16 slots are taken
    pub fn push(&mut self, addr: TypeAddr) -> Option<()> {
        let slot = self.addresses.get_mut(self.sp)?;
        *slot = addr;
        self.sp += 1;
        Some(())
    }

    pub fn pop(&mut self) -> Option<TypeAddr> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.addresses[self.sp])
    }

    pub fn addresses(&self) -> &[TypeAddr] {
        &self.addresses[..self.sp]
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
