//! Minimal ELF32 parser for the Pinion teaching kernel.
//!
//! Parses and validates the ELF32 file header and program header entries of
//! statically linked i386 executables from raw byte slices. Field extraction
//! uses `from_le_bytes`; there is no unsafe code and no allocation.
//!
//! The parser never touches a file: the loader reads the header and the
//! program header table into buffers and hands the bytes over.
//!
//! # Usage
//!
//! ```
//! use pinion_elf::{Elf32Header, ProgramHeaders, SegmentType};
//!
//! fn entry_and_loads(header_bytes: &[u8], phdr_table: &[u8]) -> Option<u32> {
//!     let header = Elf32Header::parse(header_bytes).ok()?;
//!     for phdr in ProgramHeaders::new(phdr_table) {
//!         if phdr.p_type == SegmentType::Load {
//!             // validate and map the segment
//!         }
//!     }
//!     Some(header.e_entry)
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod header;
pub mod segment;

pub use header::{ELF32_EHDR_SIZE, ELF32_PHDR_SIZE, Elf32Header, ElfError, MAX_PHNUM};
pub use segment::{Elf32ProgramHeader, ProgramHeaders, SegmentFlags, SegmentType};
