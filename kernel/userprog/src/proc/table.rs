//! The global process table.
//!
//! Besides the live control blocks, the table holds the two halves of the
//! exit/wait rendezvous:
//!
//! - exit records, one per exited child whose parent is still alive and has
//!   not collected it yet;
//! - wait signals, one per child a parent is currently blocked on.
//!
//! Both live under the same lock as the control blocks, so an exit can never
//! slip between a parent's "no record yet" check and its registration as a
//! waiter.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use pinion_core::id::Pid;
use pinion_core::sync::{Semaphore, SpinLock};

use super::Process;
use crate::platform::Platform;

struct TableInner<P: Platform> {
    processes: BTreeMap<Pid, Arc<Process<P>>>,
    exits: BTreeMap<Pid, i32>,
    waiters: BTreeMap<Pid, Arc<P::Sema>>,
}

/// Registry of live processes and uncollected exit statuses.
pub struct ProcessTable<P: Platform> {
    inner: SpinLock<TableInner<P>>,
}

impl<P: Platform> ProcessTable<P> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            inner: SpinLock::new(TableInner {
                processes: BTreeMap::new(),
                exits: BTreeMap::new(),
                waiters: BTreeMap::new(),
            }),
        }
    }

    /// Registers `process` under its pid.
    ///
    /// # Errors
    ///
    /// Hands the process back if its pid is already taken.
    pub(crate) fn register(&self, process: Arc<Process<P>>) -> Result<(), Arc<Process<P>>> {
        let mut inner = self.inner.lock();
        let pid = process.pid();
        if inner.processes.contains_key(&pid) {
            return Err(process);
        }
        inner.processes.insert(pid, process);
        Ok(())
    }

    /// Returns the live process with id `pid`.
    pub fn lookup(&self, pid: Pid) -> Option<Arc<Process<P>>> {
        self.inner.lock().processes.get(&pid).cloned()
    }

    /// Number of live processes, the boot process included.
    pub fn len(&self) -> usize {
        self.inner.lock().processes.len()
    }

    /// Returns `true` if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().processes.is_empty()
    }

    /// Ids of all live processes, in ascending order.
    pub fn pids(&self) -> Vec<Pid> {
        self.inner.lock().processes.keys().copied().collect()
    }

    /// Returns `true` if `pid` exited and its status awaits collection.
    pub fn has_exit_record(&self, pid: Pid) -> bool {
        self.inner.lock().exits.contains_key(&pid)
    }

    /// Number of uncollected exit statuses.
    pub fn exit_records(&self) -> usize {
        self.inner.lock().exits.len()
    }

    /// Unregisters an exiting process and publishes its status.
    ///
    /// The status is recorded only while the parent is alive, and never
    /// overwrites an earlier record. Records left by the process's own
    /// children can no longer be collected and are discarded. A parent
    /// blocked on this process is woken after the record is in place.
    pub(crate) fn finish_exit(&self, process: &Process<P>, status: i32) {
        let pid = process.pid();
        let (removed, waiter) = {
            let mut inner = self.inner.lock();
            let removed = inner.processes.remove(&pid);
            let parent_alive = process
                .parent()
                .is_some_and(|parent| inner.processes.contains_key(&parent));
            if parent_alive {
                inner.exits.entry(pid).or_insert(status);
            }
            for child in process.children() {
                inner.exits.remove(&child);
            }
            (removed, inner.waiters.get(&pid).cloned())
        };

        if let Some(signal) = waiter {
            signal.up();
        }
        // The last reference may be this one; release it outside the lock.
        drop(removed);
    }

    /// Blocks until `child` has exited, then consumes and returns its status.
    ///
    /// Returns `None` if `child` is neither live nor has a record, which
    /// means it died in a way that left no status to collect.
    pub(crate) fn wait_for(&self, child: Pid) -> Option<i32> {
        let signal = {
            let mut inner = self.inner.lock();
            if let Some(status) = inner.exits.remove(&child) {
                return Some(status);
            }
            if !inner.processes.contains_key(&child) {
                return None;
            }
            let signal = Arc::new(P::Sema::new(0));
            inner.waiters.insert(child, Arc::clone(&signal));
            signal
        };

        signal.down();

        let mut inner = self.inner.lock();
        inner.waiters.remove(&child);
        inner.exits.remove(&child)
    }
}

impl<P: Platform> Default for ProcessTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
