//! User-program layer configuration.
//!
//! Compile-time limits live in constants; runtime knobs are collected in
//! [`UserprogConfig`], which the embedding kernel passes to
//! [`Kernel::new`](crate::Kernel::new).

use pinion_core::addr::PAGE_SIZE;
use pinion_core::id::Fd;
use pinion_core::log::LogLevel;

/// Longest process name in bytes; longer argv[0] values are truncated.
pub const NAME_MAX: usize = 15;

/// Longest command line accepted by `exec`, as if copied into one page
/// including its terminator.
pub const CMDLINE_MAX: usize = PAGE_SIZE - 1;

/// First descriptor number handed out by `open`. 0, 1 and 2 are reserved.
pub const FIRST_FD: u32 = Fd::STDERR.as_u32() + 1;

/// Maximum number of `PT_LOAD` segments in one executable.
pub const MAX_LOAD_SEGMENTS: usize = 32;

/// Runtime configuration for the user-program layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserprogConfig {
    /// Most verbose kernel log level that reaches the log sink.
    pub log_level: LogLevel,
    /// Print `"<name>: exit(<status>)"` on the console when a user process exits.
    pub echo_exit_status: bool,
    /// Name of the boot thread's process control block.
    pub boot_process_name: &'static str,
    /// Largest single console write when echoing user output to fd 1.
    pub console_chunk: usize,
}

impl UserprogConfig {
    /// The default configuration.
    pub const DEFAULT: Self = Self {
        log_level: LogLevel::Info,
        echo_exit_status: true,
        boot_process_name: "main",
        console_chunk: 256,
    };
}

impl Default for UserprogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
