//! Per-process file descriptor table.
//!
//! Descriptor numbers start at [`FIRST_FD`] and only ever grow: a closed
//! number is never handed out again during the lifetime of the process.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use pinion_core::id::Fd;

use crate::config::FIRST_FD;

/// Maps descriptor numbers to open files.
///
/// The table does not lock the file system; callers hold the kernel's file
/// system lock while they use or drop the files it returns.
#[derive(Debug)]
pub struct FdTable<F> {
    files: BTreeMap<Fd, F>,
    next_fd: u32,
}

impl<F> FdTable<F> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            next_fd: FIRST_FD,
        }
    }

    /// Stores `file` under the next descriptor number.
    ///
    /// Returns `None` (dropping the file) once the number space representable
    /// as a non-negative `i32` is used up.
    pub fn open(&mut self, file: F) -> Option<Fd> {
        if i32::try_from(self.next_fd).is_err() {
            return None;
        }
        let fd = Fd::new(self.next_fd);
        self.next_fd += 1;
        self.files.insert(fd, file);
        Some(fd)
    }

    /// Removes `fd` from the table and returns its file.
    pub fn close(&mut self, fd: Fd) -> Option<F> {
        self.files.remove(&fd)
    }

    /// Takes the file behind `fd` out of the table for a blocking operation.
    ///
    /// The number stays allocated; hand the file back with
    /// [`FdTable::restore`].
    pub fn take(&mut self, fd: Fd) -> Option<F> {
        self.files.remove(&fd)
    }

    /// Puts a file taken with [`FdTable::take`] back under `fd`.
    pub fn restore(&mut self, fd: Fd, file: F) {
        debug_assert!(fd.as_u32() < self.next_fd);
        self.files.insert(fd, file);
    }

    /// Removes every open file, in descriptor order.
    pub fn close_all(&mut self) -> Vec<F> {
        core::mem::take(&mut self.files).into_values().collect()
    }

    /// Number of open descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no descriptor is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<F> Default for FdTable<F> {
    fn default() -> Self {
        Self::new()
    }
}
