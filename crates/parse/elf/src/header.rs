//! ELF32 file header parsing.
//!
//! Validates the identification bytes and the fixed header fields of an
//! i386 executable using safe field extraction via `from_le_bytes()`.

use core::fmt;

/// ELF magic bytes: `\x7fELF`.
pub(crate) const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF class: 32-bit.
const ELFCLASS32: u8 = 1;

/// ELF data encoding: little-endian.
const ELFDATA2LSB: u8 = 1;

/// `EV_CURRENT`, used both in `e_ident` and in `e_version`.
const EV_CURRENT: u8 = 1;

/// ELF type: executable.
const ET_EXEC: u16 = 2;

/// ELF machine: Intel 80386.
const EM_386: u16 = 3;

/// Size of an ELF32 file header (52 bytes).
pub const ELF32_EHDR_SIZE: usize = 52;

/// Size of an ELF32 program header entry (32 bytes).
pub const ELF32_PHDR_SIZE: usize = 32;

/// Upper bound on `e_phnum`; anything larger is treated as a corrupt file.
pub const MAX_PHNUM: u16 = 1024;

/// Read a little-endian `u16` from `data` at byte offset `off`.
///
/// Callers must bounds-check first.
pub(crate) fn le_u16(data: &[u8], off: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&data[off..off + 2]);
    u16::from_le_bytes(bytes)
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
pub(crate) fn le_u32(data: &[u8], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[off..off + 4]);
    u32::from_le_bytes(bytes)
}

/// Errors that can occur when parsing an ELF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The input data is too short for the declared structure.
    Truncated,
    /// The file does not start with the ELF magic bytes.
    BadMagic,
    /// The ELF file is not 32-bit (`ELFCLASS32`).
    UnsupportedClass,
    /// The ELF file is not little-endian.
    UnsupportedEncoding,
    /// The identification or object file version is not `EV_CURRENT`.
    UnsupportedVersion,
    /// The ELF type is not `ET_EXEC`.
    UnsupportedType,
    /// The ELF machine type is not `EM_386`.
    UnsupportedMachine,
    /// `e_phentsize` does not match the ELF32 program header size.
    BadPhentsize(u16),
    /// `e_phnum` exceeds [`MAX_PHNUM`].
    TooManyProgramHeaders(u16),
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "input data truncated"),
            Self::BadMagic => write!(f, "invalid ELF magic bytes"),
            Self::UnsupportedClass => write!(f, "unsupported ELF class (expected ELFCLASS32)"),
            Self::UnsupportedEncoding => {
                write!(f, "unsupported data encoding (expected little-endian)")
            }
            Self::UnsupportedVersion => write!(f, "unsupported ELF version"),
            Self::UnsupportedType => write!(f, "unsupported ELF type (expected ET_EXEC)"),
            Self::UnsupportedMachine => write!(f, "unsupported machine type (expected EM_386)"),
            Self::BadPhentsize(size) => {
                write!(f, "program header entry size {size} (expected {ELF32_PHDR_SIZE})")
            }
            Self::TooManyProgramHeaders(n) => {
                write!(f, "{n} program headers (at most {MAX_PHNUM} allowed)")
            }
        }
    }
}

/// Parsed ELF32 file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf32Header {
    /// ELF type (always `ET_EXEC` once parsed).
    pub e_type: u16,
    /// Target machine architecture.
    pub e_machine: u16,
    /// Object file version.
    pub e_version: u32,
    /// Virtual address of the entry point.
    pub e_entry: u32,
    /// Offset of the program header table in the file.
    pub e_phoff: u32,
    /// Offset of the section header table in the file.
    pub e_shoff: u32,
    /// Processor-specific flags.
    pub e_flags: u32,
    /// Size of this header.
    pub e_ehsize: u16,
    /// Size of each program header entry.
    pub e_phentsize: u16,
    /// Number of program header entries.
    pub e_phnum: u16,
    /// Size of each section header entry.
    pub e_shentsize: u16,
    /// Number of section header entries.
    pub e_shnum: u16,
    /// Section header string table index.
    pub e_shstrndx: u16,
}

impl Elf32Header {
    /// Parse an ELF32 file header from raw bytes.
    ///
    /// Validates the magic, class, encoding, identification version, ELF
    /// type, machine, object version, program header entry size and the
    /// program header count.
    ///
    /// # Errors
    ///
    /// Returns [`ElfError`] if validation fails or the data is too short.
    pub fn parse(data: &[u8]) -> Result<Self, ElfError> {
        if data.len() < ELF32_EHDR_SIZE {
            return Err(ElfError::Truncated);
        }

        if data[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        if data[4] != ELFCLASS32 {
            return Err(ElfError::UnsupportedClass);
        }
        if data[5] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding);
        }
        if data[6] != EV_CURRENT {
            return Err(ElfError::UnsupportedVersion);
        }

        let e_type = le_u16(data, 16);
        if e_type != ET_EXEC {
            return Err(ElfError::UnsupportedType);
        }

        let e_machine = le_u16(data, 18);
        if e_machine != EM_386 {
            return Err(ElfError::UnsupportedMachine);
        }

        let e_version = le_u32(data, 20);
        if e_version != u32::from(EV_CURRENT) {
            return Err(ElfError::UnsupportedVersion);
        }

        let e_phentsize = le_u16(data, 42);
        if usize::from(e_phentsize) != ELF32_PHDR_SIZE {
            return Err(ElfError::BadPhentsize(e_phentsize));
        }

        let e_phnum = le_u16(data, 44);
        if e_phnum > MAX_PHNUM {
            return Err(ElfError::TooManyProgramHeaders(e_phnum));
        }

        Ok(Self {
            e_type,
            e_machine,
            e_version,
            e_entry: le_u32(data, 24),
            e_phoff: le_u32(data, 28),
            e_shoff: le_u32(data, 32),
            e_flags: le_u32(data, 36),
            e_ehsize: le_u16(data, 40),
            e_phentsize,
            e_phnum,
            e_shentsize: le_u16(data, 46),
            e_shnum: le_u16(data, 48),
            e_shstrndx: le_u16(data, 50),
        })
    }

    /// Returns the size in bytes of the program header table.
    #[must_use]
    pub fn program_table_len(&self) -> usize {
        usize::from(self.e_phnum) * ELF32_PHDR_SIZE
    }
}
