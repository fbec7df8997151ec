//! File and console syscalls.
//!
//! Every handler that touches the file system or an open file holds the
//! kernel-wide file system lock for the whole operation, including dropping
//! a closed file. The descriptor table's spin lock is only held to look a
//! file up, never across the I/O itself.

use alloc::vec;
use alloc::vec::Vec;

use pinion_core::addr::VirtAddr;
use pinion_core::fs::{File, FileSystem};
use pinion_core::id::Fd;
use pinion_core::sync::SleepLockGuard;

use super::userptr::copy_out;
use crate::Kernel;
use crate::error::ValidationError;
use crate::platform::{FileOf, Platform};
use crate::proc::Process;

fn len_to_i32(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Runs `f` on the file behind `fd` with the descriptor table unlocked.
///
/// The file is taken out of the table for the duration. Holding the file
/// system lock keeps every other handler, and process teardown, away from
/// the table entry meanwhile.
fn with_file<P: Platform, R>(
    _fs: &SleepLockGuard<'_, P::Fs, P::Sema>,
    process: &Process<P>,
    fd: Fd,
    f: impl FnOnce(&mut FileOf<P>) -> R,
) -> Option<R> {
    let mut file = process.fds().take(fd)?;
    let result = f(&mut file);
    process.fds().restore(fd, file);
    Some(result)
}

impl<P: Platform> Kernel<P> {
    pub(super) fn sys_create(&self, path: &[u8], initial_size: u32) -> i32 {
        let Ok(path) = core::str::from_utf8(path) else {
            return 0;
        };
        i32::from(self.fs().lock().create(path, initial_size))
    }

    pub(super) fn sys_remove(&self, path: &[u8]) -> i32 {
        let Ok(path) = core::str::from_utf8(path) else {
            return 0;
        };
        i32::from(self.fs().lock().remove(path))
    }

    pub(super) fn sys_open(&self, process: &Process<P>, path: &[u8]) -> i32 {
        let Ok(path) = core::str::from_utf8(path) else {
            return -1;
        };
        let fs = self.fs().lock();
        let Some(file) = fs.open(path) else {
            return -1;
        };
        process
            .fds()
            .open(file)
            .and_then(|fd| i32::try_from(fd.as_u32()).ok())
            .unwrap_or(-1)
    }

    pub(super) fn sys_filesize(&self, process: &Process<P>, fd: Fd) -> i32 {
        let fs = self.fs().lock();
        with_file(&fs, process, fd, |file| file.length())
            .map_or(-1, |len| i32::try_from(len).unwrap_or(i32::MAX))
    }

    /// Reads into a user buffer that was checked writable during decoding.
    pub(super) fn sys_read(
        &self,
        process: &Process<P>,
        fd: Fd,
        buf: VirtAddr,
        len: u32,
    ) -> Result<i32, ValidationError> {
        let data: Vec<u8> = if fd == Fd::STDIN {
            (0..len).map(|_| self.platform().console_getc()).collect()
        } else {
            let fs = self.fs().lock();
            let read = with_file(&fs, process, fd, |file| {
                let mut data = vec![0u8; len as usize];
                let read = file.read(&mut data);
                data.truncate(read);
                data
            });
            let Some(data) = read else {
                return Ok(-1);
            };
            data
        };

        process
            .with_page_dir(|page_dir| copy_out(page_dir, buf, &data))
            .unwrap_or(Err(ValidationError::NoAddressSpace))?;
        Ok(len_to_i32(data.len()))
    }

    pub(super) fn sys_write(&self, process: &Process<P>, fd: Fd, data: &[u8]) -> i32 {
        if fd == Fd::STDOUT {
            for chunk in data.chunks(self.config().console_chunk.max(1)) {
                self.platform().console_write(chunk);
            }
            return len_to_i32(data.len());
        }
        let fs = self.fs().lock();
        with_file(&fs, process, fd, |file| len_to_i32(file.write(data))).unwrap_or(-1)
    }

    pub(super) fn sys_seek(&self, process: &Process<P>, fd: Fd, pos: u32) {
        let fs = self.fs().lock();
        with_file(&fs, process, fd, |file| file.seek(pos));
    }

    pub(super) fn sys_tell(&self, process: &Process<P>, fd: Fd) -> i32 {
        let fs = self.fs().lock();
        with_file(&fs, process, fd, |file| file.tell())
            .map_or(-1, |pos| i32::try_from(pos).unwrap_or(i32::MAX))
    }

    pub(super) fn sys_close(&self, process: &Process<P>, fd: Fd) {
        let _fs = self.fs().lock();
        let file = process.fds().close(fd);
        drop(file);
    }
}
