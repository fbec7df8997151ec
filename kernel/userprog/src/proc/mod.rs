//! Process control blocks and lifecycle.
//!
//! A [`Process`] is created by the thread that will run it, once its
//! executable is loaded, and registered in the [`ProcessTable`]. It lives
//! until [`Kernel::exit_process`](crate::Kernel::exit_process) tears it
//! down: descriptors and the executable are closed, the address space is
//! destroyed, and only then is the control block unregistered and released.

pub mod argv;
pub mod binfmt;
mod exec;
mod exit;
pub mod stack;
mod table;

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use pinion_core::addr::VirtAddr;
use pinion_core::id::Pid;
use pinion_core::kdebug;
use pinion_core::sync::{SpinLock, SpinLockGuard};
use planck_noalloc::vec::ArrayVec;

use crate::config::NAME_MAX;
use crate::fd::FdTable;
use crate::platform::{FileOf, Platform};

pub use table::ProcessTable;

// ── Process name ────────────────────────────────────────────────────

/// A process name of at most [`NAME_MAX`] bytes.
pub struct ProcessName(ArrayVec<u8, NAME_MAX>);

impl ProcessName {
    /// Builds a name from `name`, truncated on a character boundary.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(NAME_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = ArrayVec::new();
        for &b in &name.as_bytes()[..end] {
            // Cannot fail: `end <= NAME_MAX`.
            let _ = bytes.try_push(b);
        }
        Self(bytes)
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.0.as_slice()).unwrap_or("?")
    }
}

// ── Heap ────────────────────────────────────────────────────────────

/// Bounds of the heap grown by `sbrk`.
///
/// Every page from `start` up to `brk` rounded up is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heap {
    /// Page-aligned lowest heap address, just past the loaded image.
    pub start: VirtAddr,
    /// Current break.
    pub brk: VirtAddr,
}

// ── Process control block ───────────────────────────────────────────

/// A process control block.
pub struct Process<P: Platform> {
    pid: Pid,
    parent: Option<Pid>,
    name: ProcessName,
    argv: Vec<String>,
    page_dir: SpinLock<Option<P::PageDir>>,
    fds: SpinLock<FdTable<FileOf<P>>>,
    executable: SpinLock<Option<FileOf<P>>>,
    children: SpinLock<Vec<Pid>>,
    heap: SpinLock<Heap>,
    exiting: AtomicBool,
}

impl<P: Platform> Process<P> {
    /// Creates the control block for a user process about to be loaded.
    ///
    /// `argv` must not be empty; its first element names the process.
    pub(crate) fn new(pid: Pid, parent: Pid, argv: Vec<String>) -> Self {
        let name = ProcessName::new(argv.first().map_or("", String::as_str));
        Self::with_parts(pid, Some(parent), name, argv)
    }

    /// Creates the minimal control block of the boot thread.
    pub(crate) fn boot(pid: Pid, name: &str) -> Self {
        Self::with_parts(pid, None, ProcessName::new(name), Vec::new())
    }

    fn with_parts(pid: Pid, parent: Option<Pid>, name: ProcessName, argv: Vec<String>) -> Self {
        Self {
            pid,
            parent,
            name,
            argv,
            page_dir: SpinLock::new(None),
            fds: SpinLock::new(FdTable::new()),
            executable: SpinLock::new(None),
            children: SpinLock::new(Vec::new()),
            heap: SpinLock::new(Heap {
                start: VirtAddr::zero(),
                brk: VirtAddr::zero(),
            }),
            exiting: AtomicBool::new(false),
        }
    }

    /// Returns the process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the parent's pid, or `None` for the boot process.
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    /// Returns the process name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the argument vector the process was started with.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Returns `true` for the boot thread's control block.
    pub fn is_boot(&self) -> bool {
        self.parent.is_none()
    }

    // ── Address space ───────────────────────────────────────────────

    /// Runs `f` on the page directory, or returns `None` if the process has
    /// none (boot process, or already torn down).
    pub fn with_page_dir<R>(&self, f: impl FnOnce(&mut P::PageDir) -> R) -> Option<R> {
        self.page_dir.lock().as_mut().map(f)
    }

    pub(crate) fn set_page_dir(&self, page_dir: P::PageDir) {
        *self.page_dir.lock() = Some(page_dir);
    }

    pub(crate) fn take_page_dir(&self) -> Option<P::PageDir> {
        self.page_dir.lock().take()
    }

    // ── Files ───────────────────────────────────────────────────────

    /// Locks and returns the descriptor table.
    pub fn fds(&self) -> SpinLockGuard<'_, FdTable<FileOf<P>>> {
        self.fds.lock()
    }

    pub(crate) fn set_executable(&self, file: FileOf<P>) {
        *self.executable.lock() = Some(file);
    }

    pub(crate) fn take_executable(&self) -> Option<FileOf<P>> {
        self.executable.lock().take()
    }

    // ── Children ────────────────────────────────────────────────────

    /// Records `child` as a waitable child of this process.
    pub fn add_child(&self, child: Pid) {
        self.children.lock().push(child);
    }

    /// Forgets `child`. Returns `false` if it was not a child.
    pub fn remove_child(&self, child: Pid) -> bool {
        let mut children = self.children.lock();
        match children.iter().position(|&c| c == child) {
            Some(index) => {
                children.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `child` is a child not yet waited for.
    pub fn has_child(&self, child: Pid) -> bool {
        self.children.lock().contains(&child)
    }

    /// Returns the children not yet waited for.
    pub fn children(&self) -> Vec<Pid> {
        self.children.lock().clone()
    }

    // ── Heap ────────────────────────────────────────────────────────

    /// Locks and returns the heap bounds.
    pub fn heap(&self) -> SpinLockGuard<'_, Heap> {
        self.heap.lock()
    }

    // ── Exit ────────────────────────────────────────────────────────

    /// Claims the right to tear this process down. Only the first caller
    /// gets `true`.
    pub(crate) fn begin_exit(&self) -> bool {
        !self.exiting.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` once teardown has started.
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }
}

impl<P: Platform> Drop for Process<P> {
    fn drop(&mut self) {
        kdebug!("proc: released PCB of {} (pid {})", self.name(), self.pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_kept() {
        assert_eq!(ProcessName::new("echo").as_str(), "echo");
    }

    #[test]
    fn long_name_truncated() {
        let name = ProcessName::new("a-very-long-program-name");
        assert_eq!(name.as_str(), "a-very-long-pro");
        assert_eq!(name.as_str().len(), NAME_MAX);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 14 ASCII bytes followed by a two-byte character straddling the limit.
        let name = ProcessName::new("abcdefghijklmné");
        assert_eq!(name.as_str(), "abcdefghijklmn");
    }

    #[test]
    fn empty_name() {
        assert_eq!(ProcessName::new("").as_str(), "");
    }
}
