//! The collaborators the user-program layer runs on.
//!
//! Threads, page directories, physical frames and the console belong to
//! other parts of the kernel. [`Platform`] gathers them behind one trait so
//! the process layer can be embedded in a kernel or driven from a host test
//! harness.

use alloc::boxed::Box;
use alloc::sync::Arc;

use pinion_core::addr::VirtAddr;
use pinion_core::fs::FileSystem;
use pinion_core::id::Pid;
use pinion_core::paging::{Frame, PageDirectory};
use pinion_core::sync::Semaphore;

use crate::Kernel;

/// Open-file type of a platform's file system.
pub type FileOf<P> = <<P as Platform>::Fs as FileSystem>::File;

/// Where a freshly loaded process starts executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserEntry {
    /// Entry point from the executable header.
    pub entry: VirtAddr,
    /// Initial stack pointer, pointing at the fake return address.
    pub esp: VirtAddr,
}

/// Services the user-program layer needs from the rest of the kernel.
pub trait Platform: Send + Sync + Sized + 'static {
    /// Per-process page directory.
    type PageDir: PageDirectory;
    /// The file system executables and user files live on.
    type Fs: FileSystem;
    /// Blocking semaphore used for the load handshake, waits and the file
    /// system lock.
    type Sema: Semaphore;

    /// Returns the id of the running thread.
    fn current_thread(&self) -> Pid;

    /// Creates a kernel thread named `name` that runs `main`.
    ///
    /// The returned id must equal what [`Platform::current_thread`] reports
    /// inside `main`. Returns `None` if no thread could be created.
    fn spawn_thread(&self, name: &str, main: Box<dyn FnOnce() + Send + 'static>) -> Option<Pid>;

    /// Creates an empty user page directory.
    fn create_page_dir(&self) -> Option<Self::PageDir>;

    /// Loads `page_dir` into the MMU, or the kernel-only directory for `None`.
    fn activate(&self, page_dir: Option<&Self::PageDir>);

    /// Allocates one page from the user pool.
    fn alloc_user_frame(&self) -> Option<Frame>;

    /// Writes raw bytes to the console.
    fn console_write(&self, bytes: &[u8]);

    /// Reads one byte from the keyboard, blocking until one is available.
    fn console_getc(&self) -> u8;

    /// Powers the machine off.
    fn power_off(&self);

    /// Drops the current thread into user mode at `entry`.
    ///
    /// On hardware this does not return; the process leaves through the exit
    /// path and its thread is destroyed there. Host harnesses return once the
    /// simulated program has exited.
    fn enter_user(kernel: &Arc<Kernel<Self>>, entry: UserEntry);
}
