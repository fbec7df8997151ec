//! Host harness: runs the user-program layer on std threads.
//!
//! User programs are Rust closures registered under an executable name. The
//! executable itself is a real ELF image in an in-memory file system, so
//! every `exec` goes through the full loader. A program talks to the kernel
//! only through [`User::syscall`], which pushes the syscall words onto the
//! process's real stack page and traps into [`Kernel::syscall`].

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread::JoinHandle;

use pinion_core::addr::VirtAddr;
use pinion_core::fs::{File, FileSystem};
use pinion_core::id::Pid;
use pinion_core::log::{self, LogLevel};
use pinion_core::paging::{Frame, MapFlags, PageDirectory};
use pinion_core::sync::Semaphore;
use pinion_core::syscall::{SYS_EXIT, SYS_SBRK};
use pinion_userprog::proc::stack::STACK_PAGE;
use pinion_userprog::syscall::userptr::{UserMemory, copy_out};
use pinion_userprog::{Kernel, LoadError, Platform, SyscallFlow, TrapFrame, UserEntry, UserprogConfig};

// ── Threads ─────────────────────────────────────────────────────────

static NEXT_TID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static TID: Cell<u32> = const { Cell::new(0) };
}

fn current_tid() -> u32 {
    TID.with(|tid| {
        if tid.get() == 0 {
            tid.set(NEXT_TID.fetch_add(1, Ordering::SeqCst));
        }
        tid.get()
    })
}

/// Counting semaphore on a mutex and condition variable.
pub struct HostSemaphore {
    count: Mutex<u32>,
    cvar: Condvar,
}

impl Semaphore for HostSemaphore {
    fn new(value: u32) -> Self {
        Self {
            count: Mutex::new(value),
            cvar: Condvar::new(),
        }
    }

    fn down(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.cvar.wait(count).unwrap();
        }
        *count -= 1;
    }

    fn up(&self) {
        *self.count.lock().unwrap() += 1;
        self.cvar.notify_one();
    }
}

// ── Page directories ────────────────────────────────────────────────

pub struct MemPageDir {
    pages: BTreeMap<VirtAddr, (Frame, MapFlags)>,
    live: Arc<AtomicUsize>,
}

impl PageDirectory for MemPageDir {
    fn set_page(&mut self, upage: VirtAddr, frame: Frame, flags: MapFlags) -> Result<(), Frame> {
        if self.pages.contains_key(&upage) {
            return Err(frame);
        }
        self.pages.insert(upage, (frame, flags));
        Ok(())
    }

    fn page(&self, upage: VirtAddr) -> Option<&Frame> {
        self.pages.get(&upage).map(|(frame, _)| frame)
    }

    fn page_mut(&mut self, upage: VirtAddr) -> Option<&mut Frame> {
        self.pages.get_mut(&upage).map(|(frame, _)| frame)
    }

    fn flags(&self, upage: VirtAddr) -> Option<MapFlags> {
        self.pages.get(&upage).map(|(_, flags)| *flags)
    }

    fn clear_page(&mut self, upage: VirtAddr) -> Option<Frame> {
        self.pages.remove(&upage).map(|(frame, _)| frame)
    }
}

impl Drop for MemPageDir {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── File system ─────────────────────────────────────────────────────

#[derive(Default)]
struct Inode {
    data: Vec<u8>,
    deny_count: usize,
}

/// Called at the start of every `read` and `write` on an open file.
pub type IoHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct FsInner {
    files: Mutex<BTreeMap<String, Arc<Mutex<Inode>>>>,
    handles: AtomicUsize,
    io_hook: Mutex<Option<IoHook>>,
}

impl FsInner {
    fn run_io_hook(&self) {
        let hook = self.io_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// In-memory flat file system. Clones share the same files.
#[derive(Clone, Default)]
pub struct MemFs {
    inner: Arc<FsInner>,
}

impl MemFs {
    pub fn install(&self, name: &str, data: Vec<u8>) {
        let inode = Inode {
            data,
            deny_count: 0,
        };
        self.inner
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(inode)));
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.inner.files.lock().unwrap();
        files.get(name).map(|inode| inode.lock().unwrap().data.clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.files.lock().unwrap().contains_key(name)
    }

    pub fn write_denied(&self, name: &str) -> bool {
        let files = self.inner.files.lock().unwrap();
        files
            .get(name)
            .is_some_and(|inode| inode.lock().unwrap().deny_count > 0)
    }

    pub fn set_io_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.inner.io_hook.lock().unwrap() = Some(Arc::new(hook));
    }

    /// Number of open file handles across all processes.
    pub fn open_handles(&self) -> usize {
        self.inner.handles.load(Ordering::SeqCst)
    }
}

impl FileSystem for MemFs {
    type File = MemFile;

    fn open(&self, path: &str) -> Option<MemFile> {
        let inode = Arc::clone(self.inner.files.lock().unwrap().get(path)?);
        self.inner.handles.fetch_add(1, Ordering::SeqCst);
        Some(MemFile {
            inode,
            pos: 0,
            denying: false,
            fs: Arc::clone(&self.inner),
        })
    }

    fn create(&self, path: &str, initial_size: u32) -> bool {
        let mut files = self.inner.files.lock().unwrap();
        if path.is_empty() || files.contains_key(path) {
            return false;
        }
        let inode = Inode {
            data: vec![0; initial_size as usize],
            deny_count: 0,
        };
        files.insert(path.to_string(), Arc::new(Mutex::new(inode)));
        true
    }

    fn remove(&self, path: &str) -> bool {
        self.inner.files.lock().unwrap().remove(path).is_some()
    }
}

pub struct MemFile {
    inode: Arc<Mutex<Inode>>,
    pos: u32,
    denying: bool,
    fs: Arc<FsInner>,
}

impl File for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.fs.run_io_hook();
        let n = self.read_at(buf, self.pos);
        self.pos += n as u32;
        n
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u32) -> usize {
        let inode = self.inode.lock().unwrap();
        let start = (offset as usize).min(inode.data.len());
        let n = buf.len().min(inode.data.len() - start);
        buf[..n].copy_from_slice(&inode.data[start..start + n]);
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.fs.run_io_hook();
        let mut inode = self.inode.lock().unwrap();
        if inode.deny_count > 0 {
            return 0;
        }
        let start = (self.pos as usize).min(inode.data.len());
        let n = buf.len().min(inode.data.len() - start);
        inode.data[start..start + n].copy_from_slice(&buf[..n]);
        self.pos += n as u32;
        n
    }

    fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn length(&self) -> u32 {
        self.inode.lock().unwrap().data.len() as u32
    }

    fn deny_write(&mut self) {
        if !self.denying {
            self.denying = true;
            self.inode.lock().unwrap().deny_count += 1;
        }
    }

    fn allow_write(&mut self) {
        if self.denying {
            self.denying = false;
            self.inode.lock().unwrap().deny_count -= 1;
        }
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.allow_write();
        self.fs.handles.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── ELF images ──────────────────────────────────────────────────────

pub const TEXT: u32 = 0x0804_8000;
pub const DATA: u32 = 0x0804_a000;
pub const HEAP_START: u32 = 0x0804_b000;
pub const ENTRY: u32 = TEXT + 0x10;

fn phdr(buf: &mut Vec<u8>, flags: u32, offset: u32, vaddr: u32, filesz: u32, memsz: u32) {
    for word in [1, offset, vaddr, vaddr, filesz, memsz, flags, 0x1000] {
        buf.extend_from_slice(&u32::to_le_bytes(word));
    }
}

/// A small static i386 executable: one page of read-only text and one page
/// of data plus bss.
pub fn elf_image() -> Vec<u8> {
    let mut buf = vec![0u8; 52];
    buf[..4].copy_from_slice(b"\x7fELF");
    buf[4] = 1;
    buf[5] = 1;
    buf[6] = 1;
    buf[16..18].copy_from_slice(&2u16.to_le_bytes());
    buf[18..20].copy_from_slice(&3u16.to_le_bytes());
    buf[20..24].copy_from_slice(&1u32.to_le_bytes());
    buf[24..28].copy_from_slice(&ENTRY.to_le_bytes());
    buf[28..32].copy_from_slice(&52u32.to_le_bytes());
    buf[40..42].copy_from_slice(&52u16.to_le_bytes());
    buf[42..44].copy_from_slice(&32u16.to_le_bytes());
    buf[44..46].copy_from_slice(&2u16.to_le_bytes());
    phdr(&mut buf, 0b101, 0x1000, TEXT, 0x20, 0x20);
    phdr(&mut buf, 0b110, 0x2000, DATA, 0x10, 0x100);
    buf.resize(0x2010, 0);
    buf[0x1000..0x1004].copy_from_slice(&[0x55, 0x89, 0xe5, 0xcd]);
    buf[0x2000..0x2010].copy_from_slice(b"initialized data");
    buf
}

// ── Platform ────────────────────────────────────────────────────────

/// Exit status reported for a program that panicked.
pub const PANICKED: i32 = -999;

/// A user program: returns `Some(status)` to exit normally, or `None` once
/// the kernel has ended the process.
pub type Program = Arc<dyn Fn(&mut User) -> Option<i32> + Send + Sync>;

#[derive(Default)]
pub struct HostPlatform {
    threads: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
    fail_spawn: AtomicBool,
    live_page_dirs: Arc<AtomicUsize>,
    frame_budget: Mutex<Option<usize>>,
    console: Mutex<Vec<u8>>,
    console_writes: Mutex<Vec<usize>>,
    input: Mutex<VecDeque<u8>>,
    powered_off: AtomicBool,
    programs: Mutex<BTreeMap<String, Program>>,
}

impl HostPlatform {
    pub fn register(&self, name: &str, program: Program) {
        self.programs.lock().unwrap().insert(name.to_string(), program);
    }

    /// Joins every process thread, including ones spawned while joining.
    pub fn join_all(&self) {
        loop {
            let handle = self.threads.lock().unwrap().pop();
            match handle {
                Some(handle) => handle.join().unwrap(),
                None => break,
            }
        }
    }

    pub fn threads_spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn live_page_dirs(&self) -> usize {
        self.live_page_dirs.load(Ordering::SeqCst)
    }

    /// Limits how many more user frames can be allocated.
    pub fn set_frame_budget(&self, frames: Option<usize>) {
        *self.frame_budget.lock().unwrap() = frames;
    }

    pub fn console(&self) -> String {
        String::from_utf8_lossy(&self.console.lock().unwrap()).into_owned()
    }

    pub fn console_writes(&self) -> Vec<usize> {
        self.console_writes.lock().unwrap().clone()
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.input.lock().unwrap().extend(bytes);
    }

    pub fn powered_off(&self) -> bool {
        self.powered_off.load(Ordering::SeqCst)
    }
}

impl Platform for HostPlatform {
    type PageDir = MemPageDir;
    type Fs = MemFs;
    type Sema = HostSemaphore;

    fn current_thread(&self) -> Pid {
        Pid::new(current_tid())
    }

    fn spawn_thread(&self, name: &str, main: Box<dyn FnOnce() + Send + 'static>) -> Option<Pid> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return None;
        }
        let tid = NEXT_TID.fetch_add(1, Ordering::SeqCst);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                TID.with(|cell| cell.set(tid));
                main();
            })
            .ok()?;
        self.threads.lock().unwrap().push(handle);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Some(Pid::new(tid))
    }

    fn create_page_dir(&self) -> Option<MemPageDir> {
        self.live_page_dirs.fetch_add(1, Ordering::SeqCst);
        Some(MemPageDir {
            pages: BTreeMap::new(),
            live: Arc::clone(&self.live_page_dirs),
        })
    }

    fn activate(&self, _page_dir: Option<&MemPageDir>) {}

    fn alloc_user_frame(&self) -> Option<Frame> {
        let mut budget = self.frame_budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => None,
            Some(left) => {
                *left -= 1;
                Some(Frame::zeroed())
            }
            None => Some(Frame::zeroed()),
        }
    }

    fn console_write(&self, bytes: &[u8]) {
        self.console.lock().unwrap().extend_from_slice(bytes);
        self.console_writes.lock().unwrap().push(bytes.len());
    }

    fn console_getc(&self) -> u8 {
        self.input.lock().unwrap().pop_front().unwrap_or(b'\n')
    }

    fn power_off(&self) {
        self.powered_off.store(true, Ordering::SeqCst);
    }

    fn enter_user(kernel: &Arc<Kernel<Self>>, entry: UserEntry) {
        let Some(name) = kernel
            .current_process()
            .and_then(|process| process.argv().first().cloned())
        else {
            return;
        };
        let program = kernel.platform().programs.lock().unwrap().get(&name).cloned();
        let Some(program) = program else {
            return;
        };
        let mut user = User {
            kernel: Arc::clone(kernel),
            entry,
            scratch: STACK_PAGE.as_u32() + 0x10,
        };
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| program(&mut user)));
        match outcome {
            Ok(Some(status)) => {
                user.exit(status);
            }
            Ok(None) => {}
            // Fail the waiting test instead of leaving it blocked forever.
            Err(_) => {
                user.exit(PANICKED);
            }
        }
    }
}

// ── User mode ───────────────────────────────────────────────────────

/// What a running program sees of the machine.
pub struct User {
    kernel: Arc<Kernel<HostPlatform>>,
    entry: UserEntry,
    scratch: u32,
}

impl User {
    pub fn kernel(&self) -> &Arc<Kernel<HostPlatform>> {
        &self.kernel
    }

    pub fn entry(&self) -> UserEntry {
        self.entry
    }

    /// Traps with the stack pointer at `esp`, as if the program had set it
    /// up by hand. Returns `eax`, or `None` if the process is gone.
    pub fn trap(&mut self, esp: u32) -> Option<u32> {
        let mut frame = TrapFrame { esp, eax: 0 };
        match self.kernel.syscall(&mut frame) {
            SyscallFlow::Resume => Some(frame.eax),
            SyscallFlow::Exited | SyscallFlow::Halted => None,
        }
    }

    /// Pushes `nr` and `args` below the initial stack pointer and traps.
    pub fn syscall(&mut self, nr: u32, args: &[u32]) -> Option<u32> {
        let esp = self.entry.esp.as_u32() - 0x40;
        let words: Vec<u8> = std::iter::once(nr)
            .chain(args.iter().copied())
            .flat_map(u32::to_le_bytes)
            .collect();
        self.poke(esp, &words);
        self.trap(esp)
    }

    pub fn exit(&mut self, status: i32) -> Option<u32> {
        self.syscall(SYS_EXIT, &[status as u32])
    }

    pub fn sbrk(&mut self, increment: i32) -> Option<u32> {
        self.syscall(SYS_SBRK, &[increment as u32])
    }

    /// Copies `bytes` to fresh scratch space at the bottom of the stack page
    /// and returns its address.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> u32 {
        let addr = self.scratch;
        self.scratch += bytes.len() as u32;
        assert!(self.scratch < self.entry.esp.as_u32() - 0x80, "scratch overflow");
        self.poke(addr, bytes);
        addr
    }

    /// Like [`User::push_bytes`], adding a NUL terminator.
    pub fn push_str(&mut self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.push_bytes(&bytes)
    }

    /// Writes directly into mapped, writable user memory.
    pub fn poke(&self, addr: u32, bytes: &[u8]) {
        let process = self.kernel.current_process().expect("process");
        process
            .with_page_dir(|page_dir| copy_out(page_dir, VirtAddr::new(addr), bytes))
            .expect("address space")
            .expect("poke");
    }

    /// Reads mapped user memory.
    pub fn peek(&self, addr: u32, len: u32) -> Vec<u8> {
        let process = self.kernel.current_process().expect("process");
        process
            .with_page_dir(|page_dir| UserMemory::new(&*page_dir).copy_in(VirtAddr::new(addr), len))
            .expect("address space")
            .expect("peek")
    }

    fn peek_u32(&self, addr: u32) -> u32 {
        u32::from_le_bytes(self.peek(addr, 4).try_into().unwrap())
    }

    /// Decodes `argc`/`argv` from the initial stack, as `main` would.
    pub fn argv(&self) -> Vec<String> {
        let esp = self.entry.esp.as_u32();
        let argc = self.peek_u32(esp + 4);
        let argv = self.peek_u32(esp + 8);
        assert_eq!(self.peek_u32(argv + 4 * argc), 0, "argv not NULL-terminated");
        let process = self.kernel.current_process().expect("process");
        (0..argc)
            .map(|i| {
                let ptr = self.peek_u32(argv + 4 * i);
                let bytes = process
                    .with_page_dir(|page_dir| UserMemory::new(&*page_dir).read_cstr(VirtAddr::new(ptr)))
                    .expect("address space")
                    .expect("argv string");
                String::from_utf8(bytes).unwrap()
            })
            .collect()
    }

    /// Simulates a page fault taken in user mode.
    pub fn fault(&mut self, addr: u32) {
        let flow = self.kernel.handle_user_fault(VirtAddr::new(addr));
        assert_eq!(flow, SyscallFlow::Exited);
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub kernel: Arc<Kernel<HostPlatform>>,
    pub fs: MemFs,
}

fn host_log(level: LogLevel, args: std::fmt::Arguments<'_>) {
    eprintln!("[{}] {}", level.name(), args);
}

static LOG_SINK: Once = Once::new();

impl Harness {
    pub fn new() -> Self {
        // SAFETY: host_log only writes to stderr.
        LOG_SINK.call_once(|| unsafe { log::set_log_fn(host_log) });
        let fs = MemFs::default();
        let config = UserprogConfig {
            log_level: LogLevel::Warn,
            ..UserprogConfig::DEFAULT
        };
        let kernel = Kernel::new(HostPlatform::default(), fs.clone(), config);
        Self { kernel, fs }
    }

    pub fn platform(&self) -> &HostPlatform {
        self.kernel.platform()
    }

    /// Installs an executable named `name` that runs `program`.
    pub fn program<F>(&self, name: &str, program: F)
    where
        F: Fn(&mut User) -> Option<i32> + Send + Sync + 'static,
    {
        self.fs.install(name, elf_image());
        self.platform().register(name, Arc::new(program));
    }

    pub fn exec(&self, cmdline: &str) -> Result<Pid, LoadError> {
        self.kernel.exec(cmdline)
    }

    pub fn wait(&self, child: Pid) -> i32 {
        self.kernel.wait(child)
    }

    /// Waits for every process thread to finish.
    pub fn settle(&self) {
        self.platform().join_all();
    }

    pub fn console(&self) -> String {
        self.platform().console()
    }
}
