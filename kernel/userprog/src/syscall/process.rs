//! `exec` handler. `exit`, `wait` and `halt` go straight to the kernel.

use alloc::sync::Arc;

use pinion_core::kdebug;

use crate::Kernel;
use crate::platform::Platform;
use crate::proc::Process;

impl<P: Platform> Kernel<P> {
    /// Starts a child and returns its pid, or -1.
    pub(super) fn sys_exec(self: &Arc<Self>, process: &Process<P>, cmdline: &[u8]) -> i32 {
        let Ok(cmdline) = core::str::from_utf8(cmdline) else {
            kdebug!("exec: command line from pid {} is not UTF-8", process.pid());
            return -1;
        };
        match self.process_execute(process, cmdline) {
            Ok(child) => i32::try_from(child.as_u32()).unwrap_or(-1),
            Err(err) => {
                kdebug!("exec: {:?} from pid {} failed: {}", cmdline, process.pid(), err);
                -1
            }
        }
    }
}
