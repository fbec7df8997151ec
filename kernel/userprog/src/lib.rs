//! Process lifecycle and syscall layer of the Pinion teaching kernel.
//!
//! This crate turns an executable on disk into a running user process and
//! mediates everything that process asks of the kernel:
//!
//! - [`proc::binfmt`] validates an ELF32 image and maps its segments.
//! - [`proc::stack`] lays out `argc`/`argv` on the initial user stack.
//! - [`proc`] owns the process control block and the process table, which
//!   provides the one-shot rendezvous between a child's exit and its
//!   parent's wait.
//! - [`fd`] is the per-process descriptor table.
//! - [`syscall`] decodes and validates every trap before dispatching it.
//!
//! Threads, page directories, frames, the file system and the console are
//! supplied by a [`Platform`] implementation.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod fd;
mod kernel;
pub mod platform;
pub mod proc;
pub mod syscall;

#[cfg(test)]
mod test_support;

pub use config::UserprogConfig;
pub use error::{LoadError, ResourceError, SegmentError, StackError, ValidationError};
pub use kernel::Kernel;
pub use platform::{Platform, UserEntry};
pub use syscall::{SyscallFlow, TrapFrame};
