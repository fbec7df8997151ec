//! Checked access to user memory.
//!
//! The kernel never dereferences a user pointer directly. Every access goes
//! through the process's page directory: a range is accepted only when it
//! lies below `PHYS_BASE` and every page it touches is mapped, and writable
//! when the kernel is going to store into it.

use alloc::vec::Vec;

use pinion_core::addr::{PAGE_SIZE, VirtAddr, pages_spanning};
use pinion_core::paging::{MapFlags, PageDirectory};

use crate::error::ValidationError;

/// Read access to a process's memory through its page directory.
pub struct UserMemory<'a, D: PageDirectory> {
    page_dir: &'a D,
}

impl<'a, D: PageDirectory> UserMemory<'a, D> {
    /// Wraps `page_dir`.
    pub fn new(page_dir: &'a D) -> Self {
        Self { page_dir }
    }

    /// Checks that `[addr, addr + len)` is mapped user memory, and writable
    /// if `write` is set.
    ///
    /// A zero-length range only needs a user start address.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, scanning pages in order.
    pub fn check_range(&self, addr: VirtAddr, len: u32, write: bool) -> Result<(), ValidationError> {
        if !addr.is_user() {
            return Err(ValidationError::NotUser(addr));
        }
        if len == 0 {
            return Ok(());
        }
        let last = addr.checked_add(len - 1).ok_or(ValidationError::Overflow)?;
        if !last.is_user() {
            return Err(ValidationError::NotUser(last));
        }
        for page in pages_spanning(addr, len) {
            let flags = self.page_dir.flags(page).ok_or(ValidationError::Unmapped(page))?;
            if write && !flags.contains(MapFlags::WRITABLE) {
                return Err(ValidationError::ReadOnly(page));
            }
        }
        Ok(())
    }

    /// Reads a little-endian word.
    ///
    /// # Errors
    ///
    /// Fails if any of the four bytes is not mapped user memory.
    pub fn read_u32(&self, addr: VirtAddr) -> Result<u32, ValidationError> {
        let mut word = [0u8; 4];
        self.copy_in_to(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Copies `len` bytes out of user memory.
    ///
    /// # Errors
    ///
    /// Fails, copying nothing, if the range is not mapped user memory.
    pub fn copy_in(&self, addr: VirtAddr, len: u32) -> Result<Vec<u8>, ValidationError> {
        self.check_range(addr, len, false)?;
        let mut buf = alloc::vec![0u8; len as usize];
        self.copy_in_to(addr, &mut buf)?;
        Ok(buf)
    }

    fn copy_in_to(&self, addr: VirtAddr, buf: &mut [u8]) -> Result<(), ValidationError> {
        let len = u32::try_from(buf.len()).map_err(|_| ValidationError::Overflow)?;
        self.check_range(addr, len, false)?;

        let mut done = 0;
        while done < buf.len() {
            let at = VirtAddr::new(addr.as_u32() + done as u32);
            let page = at.page_round_down();
            let frame = self.page_dir.page(page).ok_or(ValidationError::Unmapped(page))?;
            let offset = at.page_offset();
            let n = (PAGE_SIZE - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&frame[offset..offset + n]);
            done += n;
        }
        Ok(())
    }

    /// Reads a NUL-terminated string, without its terminator.
    ///
    /// Each page is checked as the scan enters it.
    ///
    /// # Errors
    ///
    /// Fails if `addr` is not a user address, the string crosses into an
    /// unmapped page, or it reaches `PHYS_BASE` before a NUL.
    pub fn read_cstr(&self, addr: VirtAddr) -> Result<Vec<u8>, ValidationError> {
        if !addr.is_user() {
            return Err(ValidationError::NotUser(addr));
        }
        let mut bytes = Vec::new();
        let mut at = addr;
        loop {
            if !at.is_user() {
                return Err(ValidationError::Unterminated);
            }
            let page = at.page_round_down();
            let frame = self.page_dir.page(page).ok_or(ValidationError::Unmapped(page))?;
            let tail = &frame[at.page_offset()..];
            if let Some(nul) = tail.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&tail[..nul]);
                return Ok(bytes);
            }
            bytes.extend_from_slice(tail);
            at = page
                .checked_add(PAGE_SIZE as u32)
                .ok_or(ValidationError::Unterminated)?;
        }
    }
}

/// Copies `data` into user memory at `addr`.
///
/// # Errors
///
/// Fails, writing nothing, unless the whole range is mapped writable user
/// memory.
pub fn copy_out<D: PageDirectory>(
    page_dir: &mut D,
    addr: VirtAddr,
    data: &[u8],
) -> Result<(), ValidationError> {
    let len = u32::try_from(data.len()).map_err(|_| ValidationError::Overflow)?;
    UserMemory::new(page_dir).check_range(addr, len, true)?;

    let mut done = 0;
    while done < data.len() {
        let at = VirtAddr::new(addr.as_u32() + done as u32);
        let page = at.page_round_down();
        let frame = page_dir.page_mut(page).ok_or(ValidationError::Unmapped(page))?;
        let offset = at.page_offset();
        let n = (PAGE_SIZE - offset).min(data.len() - done);
        frame[offset..offset + n].copy_from_slice(&data[done..done + n]);
        done += n;
    }
    Ok(())
}
