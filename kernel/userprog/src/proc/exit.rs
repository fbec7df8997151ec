//! Process termination and `wait`.

use alloc::format;

use pinion_core::fs::File;
use pinion_core::id::Pid;
use pinion_core::{kdebug, ktrace};

use super::Process;
use crate::Kernel;
use crate::platform::Platform;

impl<P: Platform> Kernel<P> {
    /// Terminates `process` with `status`.
    ///
    /// Every way a process can die ends here. Only the first call for a
    /// process does anything. The exit message is printed, the address space
    /// is destroyed, open files and the executable are closed, and finally
    /// the control block leaves the table and the parent is told.
    pub fn exit_process(&self, process: &Process<P>, status: i32) {
        if !process.begin_exit() {
            ktrace!("exit: pid {} already exiting", process.pid());
            return;
        }

        if self.config().echo_exit_status && !process.is_boot() {
            let line = format!("{}: exit({})\n", process.name(), status);
            self.platform().console_write(line.as_bytes());
        }

        self.release_resources(process);
        self.processes().finish_exit(process, status);
        kdebug!("exit: {} (pid {}) status {}", process.name(), process.pid(), status);
    }

    /// Destroys the address space, then closes descriptors and the
    /// executable.
    pub(crate) fn release_resources(&self, process: &Process<P>) {
        if let Some(page_dir) = process.take_page_dir() {
            self.platform().activate(None);
            drop(page_dir);
        }

        let _fs = self.fs().lock();
        let files = process.fds().close_all();
        drop(files);
        if let Some(mut executable) = process.take_executable() {
            executable.allow_write();
        }
    }

    /// Waits for `child` of `parent` to exit and returns its status.
    ///
    /// Returns -1 if `child` is not a child of `parent`, was already waited
    /// for, or died without a status. A child can be collected once.
    pub fn process_wait(&self, parent: &Process<P>, child: Pid) -> i32 {
        if !parent.has_child(child) {
            kdebug!("wait: pid {} is not a child of pid {}", child, parent.pid());
            return -1;
        }
        let status = self.processes().wait_for(child);
        parent.remove_child(child);
        ktrace!("wait: pid {} collected pid {}: {:?}", parent.pid(), child, status);
        status.unwrap_or(-1)
    }
}
