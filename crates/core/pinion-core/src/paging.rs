//! User page frames and the page directory interface.
//!
//! The kernel never walks page tables itself. It allocates [`Frame`]s from
//! the user pool, fills them, and hands ownership to a [`PageDirectory`],
//! which installs them at user virtual addresses. Dropping the page directory
//! destroys it and frees every frame it still owns.

use alloc::boxed::Box;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::addr::{PAGE_SIZE, VirtAddr};

/// One page of memory owned by the kernel until it is mapped.
pub struct Frame(Box<[u8; PAGE_SIZE]>);

impl Frame {
    /// Allocates a zero-filled frame.
    #[must_use]
    pub fn zeroed() -> Self {
        Self(Box::new([0; PAGE_SIZE]))
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl DerefMut for Frame {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").finish_non_exhaustive()
    }
}

bitflags::bitflags! {
    /// Attributes of a user mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        /// User code may write the page.
        const WRITABLE = 1 << 0;
        /// The page holds code. Informational on i386, which has no NX bit.
        const EXECUTABLE = 1 << 1;
    }
}

/// A per-process page directory.
///
/// Addresses passed to these methods are page aligned user addresses.
/// `Drop` destroys the directory, releasing every frame still mapped.
pub trait PageDirectory: Send {
    /// Maps `frame` at `upage`.
    ///
    /// # Errors
    ///
    /// Returns the frame back if `upage` is already mapped or the directory
    /// cannot allocate a page table for it.
    fn set_page(&mut self, upage: VirtAddr, frame: Frame, flags: MapFlags) -> Result<(), Frame>;

    /// Returns the frame mapped at `upage`, if any.
    fn page(&self, upage: VirtAddr) -> Option<&Frame>;

    /// Returns the frame mapped at `upage` for writing, if any.
    fn page_mut(&mut self, upage: VirtAddr) -> Option<&mut Frame>;

    /// Returns the attributes of the mapping at `upage`, if any.
    fn flags(&self, upage: VirtAddr) -> Option<MapFlags>;

    /// Unmaps `upage`, returning its frame.
    fn clear_page(&mut self, upage: VirtAddr) -> Option<Frame>;
}
