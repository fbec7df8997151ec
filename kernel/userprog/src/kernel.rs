//! The kernel-lifetime context shared by every process thread.

use alloc::sync::Arc;

use pinion_core::addr::VirtAddr;
use pinion_core::id::Pid;
use pinion_core::log;
use pinion_core::sync::SleepLock;
use pinion_core::{kfatal, kinfo, kwarn};

use crate::config::UserprogConfig;
use crate::error::LoadError;
use crate::platform::Platform;
use crate::proc::{Process, ProcessTable};
use crate::syscall::SyscallFlow;

/// The user-program layer.
///
/// Created once at boot and shared as `Arc<Kernel<P>>` with every process
/// thread. Owns the process table and the file system, which is only
/// reachable through the kernel-wide file system lock.
pub struct Kernel<P: Platform> {
    platform: P,
    config: UserprogConfig,
    processes: ProcessTable<P>,
    fs: SleepLock<P::Fs, P::Sema>,
}

impl<P: Platform> Kernel<P> {
    /// Brings up the user-program layer and gives the calling (boot) thread a
    /// minimal process control block so it can `exec` and `wait`.
    ///
    /// # Panics
    ///
    /// Panics if the boot process cannot be registered. Nothing can run
    /// without it.
    pub fn new(platform: P, fs: P::Fs, config: UserprogConfig) -> Arc<Self> {
        log::set_max_level(config.log_level);

        let boot_pid = platform.current_thread();
        let kernel = Arc::new(Self {
            platform,
            config,
            processes: ProcessTable::new(),
            fs: SleepLock::new(fs),
        });

        let boot = Arc::new(Process::boot(boot_pid, config.boot_process_name));
        if kernel.processes.register(boot).is_err() {
            kfatal!("userprog: cannot register boot process {}", boot_pid);
            panic!("userprog: boot process registration failed");
        }
        kinfo!("userprog: boot process {} ready", boot_pid);
        kernel
    }

    /// Returns the platform services.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &UserprogConfig {
        &self.config
    }

    /// Returns the process table.
    pub fn processes(&self) -> &ProcessTable<P> {
        &self.processes
    }

    pub(crate) fn fs(&self) -> &SleepLock<P::Fs, P::Sema> {
        &self.fs
    }

    /// Returns the process control block of the running thread.
    pub fn current_process(&self) -> Option<Arc<Process<P>>> {
        self.processes.lookup(self.platform.current_thread())
    }

    /// Starts `cmdline` as a child of the running process.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the running thread has no process or the
    /// child could not be loaded.
    pub fn exec(self: &Arc<Self>, cmdline: &str) -> Result<Pid, LoadError> {
        let Some(parent) = self.current_process() else {
            return Err(LoadError::NoParent);
        };
        self.process_execute(&parent, cmdline)
    }

    /// Waits for `child` of the running process. See [`Kernel::process_wait`].
    pub fn wait(&self, child: Pid) -> i32 {
        match self.current_process() {
            Some(parent) => self.process_wait(&parent, child),
            None => -1,
        }
    }

    /// Kills the running process after an unrecoverable user fault.
    ///
    /// Called by the page fault handler for faults raised in user mode.
    pub fn handle_user_fault(&self, fault_addr: VirtAddr) -> SyscallFlow {
        let Some(process) = self.current_process() else {
            kwarn!("userprog: user fault at {} without a process", fault_addr);
            return SyscallFlow::Exited;
        };
        kwarn!(
            "userprog: {} (pid {}) faulted at {}",
            process.name(),
            process.pid(),
            fault_addr
        );
        self.exit_process(&process, -1);
        SyscallFlow::Exited
    }
}
