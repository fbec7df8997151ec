//! Core types and synchronization primitives for the Pinion kernel.
//!
//! This crate contains the host-testable pieces shared by the user-program
//! layer: 32-bit user address helpers, identifier newtypes, the kernel log
//! macros, spin and sleep locks, the syscall number table, and the traits
//! through which the kernel reaches its collaborators (page directories and
//! the file system).
//!
//! By living outside the kernel, these types can be tested with `cargo test`
//! on the host without a kernel target.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod addr;
pub mod fs;
pub mod id;
pub mod log;
pub mod paging;
pub mod sync;
pub mod syscall;
