//! ELF32 program header decoding.
//!
//! Provides [`Elf32ProgramHeader`] for a single entry and [`ProgramHeaders`]
//! for walking a program header table that the caller has already read.

use crate::header::{ELF32_PHDR_SIZE, ElfError, le_u32};

/// Decoded program header type (`p_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// `PT_NULL`: unused entry.
    Null,
    /// `PT_LOAD`: loadable segment.
    Load,
    /// `PT_DYNAMIC`: dynamic linking information.
    Dynamic,
    /// `PT_INTERP`: program interpreter path.
    Interp,
    /// `PT_NOTE`: auxiliary information.
    Note,
    /// `PT_SHLIB`: reserved, semantics unspecified.
    Shlib,
    /// `PT_PHDR`: the program header table itself.
    Phdr,
    /// `PT_GNU_STACK`: stack permissions.
    GnuStack,
    /// Any other value, including OS and processor specific ranges.
    Other(u32),
}

impl SegmentType {
    /// Decode a raw `p_type` value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::Load,
            2 => Self::Dynamic,
            3 => Self::Interp,
            4 => Self::Note,
            5 => Self::Shlib,
            6 => Self::Phdr,
            0x6474_e551 => Self::GnuStack,
            other => Self::Other(other),
        }
    }

    /// Returns `true` for types that require a dynamic linker.
    #[must_use]
    pub const fn needs_dynamic_linking(self) -> bool {
        matches!(self, Self::Dynamic | Self::Interp | Self::Shlib)
    }
}

bitflags::bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Executable.
        const X = 1 << 0;
        /// Writable.
        const W = 1 << 1;
        /// Readable.
        const R = 1 << 2;
    }
}

/// Parsed ELF32 program header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32ProgramHeader {
    /// Segment type.
    pub p_type: SegmentType,
    /// Offset of the segment data in the file.
    pub p_offset: u32,
    /// Virtual address of the segment.
    pub p_vaddr: u32,
    /// Physical address (ignored by the loader).
    pub p_paddr: u32,
    /// Size of the segment data in the file.
    pub p_filesz: u32,
    /// Size of the segment in memory.
    pub p_memsz: u32,
    /// Segment permissions. Unknown bits are dropped.
    pub p_flags: SegmentFlags,
    /// Alignment.
    pub p_align: u32,
}

impl Elf32ProgramHeader {
    /// Parse a program header entry from the first 32 bytes of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError::Truncated`] if `data` is shorter than one entry.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < ELF32_PHDR_SIZE {
            return Err(ElfError::Truncated);
        }
        Ok(Self {
            p_type: SegmentType::from_raw(le_u32(data, 0)),
            p_offset: le_u32(data, 4),
            p_vaddr: le_u32(data, 8),
            p_paddr: le_u32(data, 12),
            p_filesz: le_u32(data, 16),
            p_memsz: le_u32(data, 20),
            p_flags: SegmentFlags::from_bits_truncate(le_u32(data, 24)),
            p_align: le_u32(data, 28),
        })
    }

    /// Returns `true` if the segment is mapped writable.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.p_flags.contains(SegmentFlags::W)
    }

    /// Returns `true` if the segment is mapped executable.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.p_flags.contains(SegmentFlags::X)
    }
}

/// Iterator over the entries of a program header table.
///
/// A trailing partial entry is ignored; the loader reads exactly
/// `e_phnum * 32` bytes so that never happens for a validated header.
#[derive(Debug, Clone)]
pub struct ProgramHeaders<'a> {
    entries: core::slice::ChunksExact<'a, u8>,
}

impl<'a> ProgramHeaders<'a> {
    /// Walk the program header table held in `table`.
    #[must_use]
    pub fn new(table: &'a [u8]) -> Self {
        Self {
            entries: table.chunks_exact(ELF32_PHDR_SIZE),
        }
    }
}

impl Iterator for ProgramHeaders<'_> {
    type Item = Elf32ProgramHeader;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Elf32ProgramHeader::parse(entry).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
