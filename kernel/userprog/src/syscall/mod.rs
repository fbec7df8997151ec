//! Syscall decoding and dispatch.
//!
//! A trap is handled in two phases. [`decode`] reads the syscall number and
//! its arguments off the user stack and validates every pointer argument,
//! producing a [`Syscall`]. Only a fully decoded call is dispatched, so a
//! bad pointer kills the process before the call has any effect.

mod file;
pub mod frame;
mod memory;
pub mod misc;
mod process;
pub mod userptr;

use alloc::sync::Arc;
use alloc::vec::Vec;

use pinion_core::addr::VirtAddr;
use pinion_core::id::{Fd, Pid};
use pinion_core::paging::PageDirectory;
use pinion_core::syscall::{
    SYS_CLOSE, SYS_COMPUTE_E, SYS_CREATE, SYS_EXEC, SYS_EXIT, SYS_FILESIZE, SYS_HALT, SYS_OPEN,
    SYS_PRACTICE, SYS_READ, SYS_REMOVE, SYS_SBRK, SYS_SEEK, SYS_TELL, SYS_WAIT, SYS_WRITE,
    arg_count, is_reserved,
};
use pinion_core::{kerr, kinfo, ktrace, kwarn};

use self::frame::SyscallFrame;
use crate::Kernel;
use crate::error::ValidationError;
use crate::platform::Platform;
use crate::proc::Process;

/// Registers saved by the trap entry that the syscall layer uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User stack pointer at the trap.
    pub esp: u32,
    /// Return value register.
    pub eax: u32,
}

/// What the trap handler does after a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallFlow {
    /// Return to user mode with `eax` set.
    Resume,
    /// The process is gone; end its thread.
    Exited,
    /// Power-off was requested.
    Halted,
}

/// A validated syscall with its arguments.
///
/// Strings and write buffers have already been copied out of user memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syscall {
    /// Power off.
    Halt,
    /// Exit with a status.
    Exit(i32),
    /// Start a command line; raw bytes, not yet checked for UTF-8.
    Exec(Vec<u8>),
    /// Wait for a child.
    Wait(Pid),
    /// Create a file.
    Create {
        /// Path bytes.
        path: Vec<u8>,
        /// Initial size in bytes.
        initial_size: u32,
    },
    /// Remove a file.
    Remove(Vec<u8>),
    /// Open a file.
    Open(Vec<u8>),
    /// Size of an open file.
    Filesize(Fd),
    /// Read into a user buffer already checked to be writable.
    Read {
        /// Source descriptor.
        fd: Fd,
        /// Destination in user memory.
        buf: VirtAddr,
        /// Bytes requested.
        len: u32,
    },
    /// Write bytes copied from user memory.
    Write {
        /// Destination descriptor.
        fd: Fd,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Move a file position.
    Seek {
        /// Descriptor.
        fd: Fd,
        /// New position.
        pos: u32,
    },
    /// Report a file position.
    Tell(Fd),
    /// Close a descriptor.
    Close(Fd),
    /// Return the argument plus one.
    Practice(i32),
    /// Approximate e.
    ComputeE(i32),
    /// Move the heap break.
    Sbrk(i32),
    /// A number reserved for multithreading.
    Reserved(u32),
}

/// Reads and validates the syscall at `esp`.
///
/// # Errors
///
/// Returns [`ValidationError`] if the number is unknown or any word,
/// string or buffer it refers to is not accessible user memory.
#[expect(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    reason = "user words carry C ints; at most three arguments"
)]
pub fn decode<D: PageDirectory>(page_dir: &D, esp: VirtAddr) -> Result<Syscall, ValidationError> {
    let frame = SyscallFrame::new(page_dir, esp);
    let nr = frame.word(0)?;
    let argc = arg_count(nr).ok_or(ValidationError::UnknownSyscall(nr))?;

    let mut args = [0u32; 3];
    for (i, arg) in args.iter_mut().enumerate().take(argc) {
        *arg = frame.word(i as u32 + 1)?;
    }
    let mem = frame.memory();

    let call = match nr {
        SYS_HALT => Syscall::Halt,
        SYS_EXIT => Syscall::Exit(args[0] as i32),
        SYS_EXEC => Syscall::Exec(mem.read_cstr(VirtAddr::new(args[0]))?),
        SYS_WAIT => Syscall::Wait(Pid::new(args[0])),
        SYS_CREATE => Syscall::Create {
            path: mem.read_cstr(VirtAddr::new(args[0]))?,
            initial_size: args[1],
        },
        SYS_REMOVE => Syscall::Remove(mem.read_cstr(VirtAddr::new(args[0]))?),
        SYS_OPEN => Syscall::Open(mem.read_cstr(VirtAddr::new(args[0]))?),
        SYS_FILESIZE => Syscall::Filesize(Fd::new(args[0])),
        SYS_READ => {
            let buf = VirtAddr::new(args[1]);
            mem.check_range(buf, args[2], true)?;
            Syscall::Read {
                fd: Fd::new(args[0]),
                buf,
                len: args[2],
            }
        }
        SYS_WRITE => Syscall::Write {
            fd: Fd::new(args[0]),
            data: mem.copy_in(VirtAddr::new(args[1]), args[2])?,
        },
        SYS_SEEK => Syscall::Seek {
            fd: Fd::new(args[0]),
            pos: args[1],
        },
        SYS_TELL => Syscall::Tell(Fd::new(args[0])),
        SYS_CLOSE => Syscall::Close(Fd::new(args[0])),
        SYS_PRACTICE => Syscall::Practice(args[0] as i32),
        SYS_COMPUTE_E => Syscall::ComputeE(args[0] as i32),
        SYS_SBRK => Syscall::Sbrk(args[0] as i32),
        nr if is_reserved(nr) => Syscall::Reserved(nr),
        nr => return Err(ValidationError::UnknownSyscall(nr)),
    };
    Ok(call)
}

impl<P: Platform> Kernel<P> {
    /// Handles a syscall trap from the running process.
    ///
    /// On [`SyscallFlow::Resume`] the result, if the call has one, is in
    /// `frame.eax`.
    #[expect(clippy::cast_sign_loss, reason = "eax holds the raw bits of the C return value")]
    pub fn syscall(self: &Arc<Self>, frame: &mut TrapFrame) -> SyscallFlow {
        let Some(process) = self.current_process() else {
            kerr!("syscall: trap from thread {} without a process", self.platform().current_thread());
            return SyscallFlow::Exited;
        };

        let esp = VirtAddr::new(frame.esp);
        let decoded = process
            .with_page_dir(|page_dir| decode(&*page_dir, esp))
            .unwrap_or(Err(ValidationError::NoAddressSpace));
        let call = match decoded {
            Ok(call) => call,
            Err(err) => return self.kill(&process, err),
        };
        ktrace!("syscall: {} (pid {}): {:?}", process.name(), process.pid(), call);

        match self.dispatch(&process, call) {
            Ok(Dispatched::Return(value)) => {
                frame.eax = value as u32;
                SyscallFlow::Resume
            }
            Ok(Dispatched::Void) => SyscallFlow::Resume,
            Ok(Dispatched::Flow(flow)) => flow,
            Err(err) => self.kill(&process, err),
        }
    }

    fn kill(&self, process: &Process<P>, err: ValidationError) -> SyscallFlow {
        kwarn!("syscall: killing {} (pid {}): {}", process.name(), process.pid(), err);
        self.exit_process(process, -1);
        SyscallFlow::Exited
    }

    fn dispatch(
        self: &Arc<Self>,
        process: &Process<P>,
        call: Syscall,
    ) -> Result<Dispatched, ValidationError> {
        let outcome = match call {
            Syscall::Halt => {
                kinfo!("syscall: halt requested by pid {}", process.pid());
                self.platform().power_off();
                Dispatched::Flow(SyscallFlow::Halted)
            }
            Syscall::Exit(status) => {
                self.exit_process(process, status);
                Dispatched::Flow(SyscallFlow::Exited)
            }
            Syscall::Exec(cmdline) => Dispatched::Return(self.sys_exec(process, &cmdline)),
            Syscall::Wait(child) => Dispatched::Return(self.process_wait(process, child)),
            Syscall::Create { path, initial_size } => {
                Dispatched::Return(self.sys_create(&path, initial_size))
            }
            Syscall::Remove(path) => Dispatched::Return(self.sys_remove(&path)),
            Syscall::Open(path) => Dispatched::Return(self.sys_open(process, &path)),
            Syscall::Filesize(fd) => Dispatched::Return(self.sys_filesize(process, fd)),
            Syscall::Read { fd, buf, len } => Dispatched::Return(self.sys_read(process, fd, buf, len)?),
            Syscall::Write { fd, data } => Dispatched::Return(self.sys_write(process, fd, &data)),
            Syscall::Seek { fd, pos } => {
                self.sys_seek(process, fd, pos);
                Dispatched::Void
            }
            Syscall::Tell(fd) => Dispatched::Return(self.sys_tell(process, fd)),
            Syscall::Close(fd) => {
                self.sys_close(process, fd);
                Dispatched::Void
            }
            Syscall::Practice(value) => Dispatched::Return(misc::practice(value)),
            Syscall::ComputeE(terms) => Dispatched::Return(misc::compute_e(terms)),
            Syscall::Sbrk(increment) => Dispatched::Return(self.sys_sbrk(process, increment)),
            Syscall::Reserved(nr) => {
                ktrace!("syscall: reserved number {}", nr);
                Dispatched::Return(-1)
            }
        };
        Ok(outcome)
    }
}

/// Result of a dispatched call.
enum Dispatched {
    /// Store the value in `eax`.
    Return(i32),
    /// Leave `eax` untouched.
    Void,
    /// Leave the normal return path.
    Flow(SyscallFlow),
}
