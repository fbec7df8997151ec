//! Executable loading.
//!
//! The loader validates every program header before it maps anything, then
//! maps each loadable segment page by page into the new process's page
//! directory. The result is an [`ExecImage`] describing where execution
//! starts and where the heap begins.

pub mod elf;

use pinion_core::addr::{PAGE_SIZE, VirtAddr};
use pinion_elf::Elf32ProgramHeader;

use crate::error::SegmentError;

/// A loaded executable, ready for its stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecImage {
    /// Virtual address of the entry point.
    pub entry: VirtAddr,
    /// First page past the highest loaded segment.
    pub heap_start: VirtAddr,
}

/// How one `PT_LOAD` segment is mapped.
///
/// Mapping starts at `mem_page` with `read_bytes` taken from the file at
/// `file_page`, followed by `zero_bytes` of zeros. The two always add up
/// to a whole number of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Page-aligned file offset the first page is read from.
    pub file_page: u32,
    /// Page-aligned virtual address of the first page.
    pub mem_page: VirtAddr,
    /// Bytes read from the file.
    pub read_bytes: u32,
    /// Bytes zero-filled after the file data.
    pub zero_bytes: u32,
    /// Map the pages writable.
    pub writable: bool,
    /// Tag the pages as code.
    pub executable: bool,
}

const PAGE_MASK: u32 = PAGE_SIZE as u32 - 1;

impl SegmentPlan {
    /// Splits a validated program header into whole pages.
    #[must_use]
    pub fn new(ph: &Elf32ProgramHeader) -> Self {
        let start = VirtAddr::new(ph.p_vaddr);
        let mem_page = start.page_round_down();
        // A validated segment ends below `PHYS_BASE`, so this never falls back.
        let end = start
            .checked_add(ph.p_memsz)
            .and_then(VirtAddr::page_round_up)
            .unwrap_or(mem_page);
        let span = end.as_u32() - mem_page.as_u32();
        let read_bytes = if ph.p_filesz > 0 {
            ph.p_vaddr - mem_page.as_u32() + ph.p_filesz
        } else {
            0
        };
        Self {
            file_page: ph.p_offset & !PAGE_MASK,
            mem_page,
            read_bytes,
            zero_bytes: span.saturating_sub(read_bytes),
            writable: ph.is_writable(),
            executable: ph.is_executable(),
        }
    }

    /// Number of pages the segment occupies.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        (self.read_bytes + self.zero_bytes) / PAGE_SIZE as u32
    }

    /// First address past the segment's last page.
    #[must_use]
    pub fn end(&self) -> VirtAddr {
        VirtAddr::new(self.mem_page.as_u32() + self.read_bytes + self.zero_bytes)
    }
}

/// Checks that a `PT_LOAD` header describes a segment that can be mapped
/// into user space from a file of `file_len` bytes.
///
/// # Errors
///
/// Returns the first [`SegmentError`] the header violates.
pub fn validate_segment(ph: &Elf32ProgramHeader, file_len: u32) -> Result<(), SegmentError> {
    if ph.p_offset & PAGE_MASK != ph.p_vaddr & PAGE_MASK {
        return Err(SegmentError::OffsetMismatch);
    }
    if ph.p_offset > file_len {
        return Err(SegmentError::OffsetPastEnd);
    }
    if ph.p_memsz < ph.p_filesz {
        return Err(SegmentError::MemSmallerThanFile);
    }
    if ph.p_memsz == 0 {
        return Err(SegmentError::Empty);
    }
    if !VirtAddr::new(ph.p_vaddr).is_user() {
        return Err(SegmentError::NotUser);
    }
    let Some(end) = ph.p_vaddr.checked_add(ph.p_memsz) else {
        return Err(SegmentError::Wraparound);
    };
    if !VirtAddr::new(end).is_user() {
        return Err(SegmentError::NotUser);
    }
    if (ph.p_vaddr as usize) < PAGE_SIZE {
        return Err(SegmentError::PageZero);
    }
    Ok(())
}
