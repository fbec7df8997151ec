//! Process creation.
//!
//! `exec` runs in the parent's thread and the load runs in the child's. The
//! parent sleeps on a one-shot handshake until the child reports whether its
//! executable loaded, so `exec` can return -1 for a binary that does not
//! exist or is malformed.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use pinion_core::addr::VirtAddr;
use pinion_core::fs::{File, FileSystem};
use pinion_core::id::Pid;
use pinion_core::paging::Frame;
use pinion_core::sync::{Semaphore, SpinLock};
use pinion_core::{kdebug, kinfo, kwarn};

use super::argv::{bound_command_line, tokenize};
use super::binfmt::{ExecImage, elf};
use super::stack::setup_stack;
use super::{Heap, Process, ProcessName};
use crate::Kernel;
use crate::error::{LoadError, ResourceError};
use crate::platform::{FileOf, Platform, UserEntry};

/// Carries the child's load result back to the waiting parent.
struct LoadHandshake<S: Semaphore> {
    done: S,
    result: SpinLock<Option<Result<(), LoadError>>>,
}

impl<S: Semaphore> LoadHandshake<S> {
    fn new() -> Self {
        Self {
            done: S::new(0),
            result: SpinLock::new(None),
        }
    }

    fn complete(&self, result: Result<(), LoadError>) {
        *self.result.lock() = Some(result);
        self.done.up();
    }

    fn wait(&self) -> Result<(), LoadError> {
        self.done.down();
        self.result
            .lock()
            .take()
            .unwrap_or(Err(LoadError::Resource(ResourceError::ThreadCreate)))
    }
}

/// A loaded image that has not been handed to its process yet.
struct Loaded<P: Platform> {
    image: ExecImage,
    esp: VirtAddr,
    executable: FileOf<P>,
}

impl<P: Platform> Kernel<P> {
    /// Starts a child of `parent` running `cmdline`.
    ///
    /// The command line is cut to one page and split on whitespace; the
    /// first word names the executable. Returns once the child has either
    /// loaded or given up.
    ///
    /// # Errors
    ///
    /// Returns the child's [`LoadError`] if it could not be started. No
    /// process is registered in that case.
    pub fn process_execute(
        self: &Arc<Self>,
        parent: &Process<P>,
        cmdline: &str,
    ) -> Result<Pid, LoadError> {
        let argv = tokenize(bound_command_line(cmdline));
        let Some(program) = argv.first() else {
            return Err(LoadError::EmptyCommand);
        };
        let thread_name = ProcessName::new(program);

        let handshake = Arc::new(LoadHandshake::<P::Sema>::new());
        let child_handshake = Arc::clone(&handshake);
        let kernel = Arc::clone(self);
        let parent_pid = parent.pid();
        let main = Box::new(move || kernel.start_process(parent_pid, argv, &child_handshake));

        let Some(child) = self.platform().spawn_thread(thread_name.as_str(), main) else {
            kwarn!("exec: no thread for {}", thread_name.as_str());
            return Err(ResourceError::ThreadCreate.into());
        };

        handshake.wait()?;
        parent.add_child(child);
        kinfo!(
            "exec: {} (pid {}) started by pid {}",
            thread_name.as_str(),
            child,
            parent_pid
        );
        Ok(child)
    }

    /// Body of a new process thread: load, report, and enter user mode.
    fn start_process(
        self: &Arc<Self>,
        parent: Pid,
        argv: Vec<String>,
        handshake: &LoadHandshake<P::Sema>,
    ) {
        let pid = self.platform().current_thread();
        let process = Arc::new(Process::new(pid, parent, argv));

        let entry = match self.load(&process) {
            Ok(entry) => entry,
            Err(err) => {
                kwarn!("exec: {}: load failed: {}", process.name(), err);
                handshake.complete(Err(err));
                return;
            }
        };

        if let Err(process) = self.processes().register(Arc::clone(&process)) {
            kwarn!("exec: pid {} already registered", pid);
            self.release_resources(&process);
            handshake.complete(Err(ResourceError::DuplicatePid.into()));
            return;
        }
        handshake.complete(Ok(()));

        kdebug!(
            "exec: {} entering user mode at {} (esp {})",
            process.name(),
            entry.entry,
            entry.esp
        );
        P::enter_user(self, entry);

        // Only a simulated user mode comes back here. A program that ran off
        // its end without calling exit is killed.
        if !process.is_exiting() {
            self.exit_process(&process, -1);
        }
    }

    /// Builds the address space of `process` and installs it.
    fn load(&self, process: &Process<P>) -> Result<UserEntry, LoadError> {
        let mut page_dir = self
            .platform()
            .create_page_dir()
            .ok_or(ResourceError::PageDirectory)?;
        self.platform().activate(Some(&page_dir));

        match self.load_image(&mut page_dir, process.argv()) {
            Ok(loaded) => {
                process.set_page_dir(page_dir);
                process.set_executable(loaded.executable);
                *process.heap() = Heap {
                    start: loaded.image.heap_start,
                    brk: loaded.image.heap_start,
                };
                Ok(UserEntry {
                    entry: loaded.image.entry,
                    esp: loaded.esp,
                })
            }
            Err(err) => {
                self.platform().activate(None);
                drop(page_dir);
                Err(err)
            }
        }
    }

    /// Opens the executable, maps it and builds the stack, all under the
    /// file system lock.
    fn load_image(&self, page_dir: &mut P::PageDir, argv: &[String]) -> Result<Loaded<P>, LoadError> {
        let program = argv.first().ok_or(LoadError::EmptyCommand)?;
        let fs = self.fs().lock();
        let mut file = fs.open(program).ok_or(LoadError::NotFound)?;

        let image = elf::load_elf(&mut file, page_dir, || self.platform().alloc_user_frame())?;
        let frame: Frame = self
            .platform()
            .alloc_user_frame()
            .ok_or(ResourceError::OutOfPages)?;
        let esp = setup_stack(page_dir, argv, frame)?;

        file.deny_write();
        Ok(Loaded {
            image,
            esp,
            executable: file,
        })
    }
}
