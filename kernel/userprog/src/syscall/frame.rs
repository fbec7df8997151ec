//! Bounds-checked view of the syscall words on the user stack.

use pinion_core::addr::VirtAddr;
use pinion_core::paging::PageDirectory;

use super::userptr::UserMemory;
use crate::error::ValidationError;

/// The words a process pushed before trapping: the syscall number at the
/// stack pointer, argument `i` at `esp + 4 * i`.
pub struct SyscallFrame<'a, D: PageDirectory> {
    memory: UserMemory<'a, D>,
    esp: VirtAddr,
}

impl<'a, D: PageDirectory> SyscallFrame<'a, D> {
    /// Views the frame at `esp` through `page_dir`.
    pub fn new(page_dir: &'a D, esp: VirtAddr) -> Self {
        Self {
            memory: UserMemory::new(page_dir),
            esp,
        }
    }

    /// Returns word `index`; word 0 is the syscall number.
    ///
    /// # Errors
    ///
    /// Fails unless all four bytes of the word are mapped user memory.
    pub fn word(&self, index: u32) -> Result<u32, ValidationError> {
        let addr = index
            .checked_mul(4)
            .and_then(|offset| self.esp.checked_add(offset))
            .ok_or(ValidationError::Overflow)?;
        self.memory.read_u32(addr)
    }

    /// Returns the user memory behind the frame, for pointer arguments.
    pub fn memory(&self) -> &UserMemory<'a, D> {
        &self.memory
    }
}
