//! Syscall number constants.
//!
//! User programs place the number in the first word at the stack pointer
//! before trapping; arguments follow in the next words.

// ── Process control (0–3) ───────────────────────────────────────────

/// Power off the machine.
pub const SYS_HALT: u32 = 0;
/// Terminate the calling process with a status.
pub const SYS_EXIT: u32 = 1;
/// Start a new process from a command line.
pub const SYS_EXEC: u32 = 2;
/// Wait for a child process to exit and collect its status.
pub const SYS_WAIT: u32 = 3;

// ── File system (4–12) ──────────────────────────────────────────────

/// Create a file with an initial size.
pub const SYS_CREATE: u32 = 4;
/// Delete a file.
pub const SYS_REMOVE: u32 = 5;
/// Open a file and return a descriptor.
pub const SYS_OPEN: u32 = 6;
/// Return the size of an open file.
pub const SYS_FILESIZE: u32 = 7;
/// Read from a descriptor.
pub const SYS_READ: u32 = 8;
/// Write to a descriptor.
pub const SYS_WRITE: u32 = 9;
/// Move the file position.
pub const SYS_SEEK: u32 = 10;
/// Report the file position.
pub const SYS_TELL: u32 = 11;
/// Close a descriptor.
pub const SYS_CLOSE: u32 = 12;

// ── Diagnostics (13–14) ─────────────────────────────────────────────

/// Return the argument plus one.
pub const SYS_PRACTICE: u32 = 13;
/// Approximate e with the first `n` terms of its series.
pub const SYS_COMPUTE_E: u32 = 14;

// ── Multithreading (15–24), reserved ────────────────────────────────

/// Create a thread in the calling process (reserved).
pub const SYS_PT_CREATE: u32 = 15;
/// Exit the calling thread (reserved).
pub const SYS_PT_EXIT: u32 = 16;
/// Join a thread (reserved).
pub const SYS_PT_JOIN: u32 = 17;
/// Initialize a user lock (reserved).
pub const SYS_LOCK_INIT: u32 = 18;
/// Acquire a user lock (reserved).
pub const SYS_LOCK_ACQUIRE: u32 = 19;
/// Release a user lock (reserved).
pub const SYS_LOCK_RELEASE: u32 = 20;
/// Initialize a user semaphore (reserved).
pub const SYS_SEMA_INIT: u32 = 21;
/// Down a user semaphore (reserved).
pub const SYS_SEMA_DOWN: u32 = 22;
/// Up a user semaphore (reserved).
pub const SYS_SEMA_UP: u32 = 23;
/// Return the calling thread id (reserved).
pub const SYS_GET_TID: u32 = 24;

// ── Memory (25) ─────────────────────────────────────────────────────

/// Move the heap break.
pub const SYS_SBRK: u32 = 25;

/// Returns `true` for numbers reserved for multithreaded processes.
#[must_use]
pub const fn is_reserved(nr: u32) -> bool {
    nr >= SYS_PT_CREATE && nr <= SYS_GET_TID
}

/// Returns the number of argument words following the syscall number, or
/// `None` if `nr` is not a known syscall.
#[must_use]
pub const fn arg_count(nr: u32) -> Option<usize> {
    match nr {
        SYS_HALT => Some(0),
        SYS_EXIT | SYS_EXEC | SYS_WAIT | SYS_REMOVE | SYS_OPEN | SYS_FILESIZE | SYS_TELL
        | SYS_CLOSE | SYS_PRACTICE | SYS_COMPUTE_E | SYS_SBRK => Some(1),
        SYS_CREATE | SYS_SEEK => Some(2),
        SYS_READ | SYS_WRITE => Some(3),
        nr if is_reserved(nr) => Some(0),
        _ => None,
    }
}
