//! File system interface consumed by the user-program layer.
//!
//! Paths are plain strings resolved by the file system. Callers serialize
//! all use of these traits behind one kernel-wide lock, so implementations
//! do not need internal locking beyond what `Send`/`Sync` demand.

/// An open file.
///
/// Closing is `Drop`. A handle that called [`File::deny_write`] and was not
/// re-allowed must re-allow writes when dropped.
pub trait File: Send {
    /// Reads into `buf` from the current position, advancing it. Returns the
    /// number of bytes read, which is short at end of file.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Reads into `buf` from byte `offset` without moving the position.
    fn read_at(&mut self, buf: &mut [u8], offset: u32) -> usize;

    /// Writes `buf` at the current position, advancing it. Returns the number
    /// of bytes written; zero while writes to the file are denied.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Moves the position to `pos`. Positions past the end are allowed.
    fn seek(&mut self, pos: u32);

    /// Returns the current position.
    fn tell(&self) -> u32;

    /// Returns the file size in bytes.
    fn length(&self) -> u32;

    /// Prevents writes to the underlying file through any handle.
    fn deny_write(&mut self);

    /// Re-enables writes denied by this handle.
    fn allow_write(&mut self);
}

/// A mounted file system.
pub trait FileSystem: Send + Sync {
    /// The open-file handle type.
    type File: File;

    /// Opens `path`, or returns `None` if it does not exist.
    fn open(&self, path: &str) -> Option<Self::File>;

    /// Creates `path` with `initial_size` zero bytes. Fails if it exists.
    fn create(&self, path: &str, initial_size: u32) -> bool;

    /// Removes `path`. Open handles stay usable until closed.
    fn remove(&self, path: &str) -> bool;
}
