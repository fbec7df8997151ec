//! Error types for loading processes and validating syscalls.
//!
//! None of these cross a process boundary: load failures become an `exec`
//! return value of -1 and validation failures terminate the offending
//! process with status -1.

use core::fmt;

use pinion_core::addr::VirtAddr;
use pinion_elf::{ElfError, SegmentType};

/// A resource could not be obtained while building a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The user page pool is exhausted.
    OutOfPages,
    /// No page directory could be created.
    PageDirectory,
    /// A page was already mapped (or could not be mapped) at this address.
    MappingConflict(VirtAddr),
    /// The thread for the new process could not be created.
    ThreadCreate,
    /// A process with this thread's id is already registered.
    DuplicatePid,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfPages => write!(f, "out of user pages"),
            Self::PageDirectory => write!(f, "cannot create page directory"),
            Self::MappingConflict(addr) => write!(f, "cannot map page at {addr}"),
            Self::ThreadCreate => write!(f, "cannot create thread"),
            Self::DuplicatePid => write!(f, "pid already registered"),
        }
    }
}

/// Why a `PT_LOAD` program header was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// `p_offset` and `p_vaddr` have different page offsets.
    OffsetMismatch,
    /// `p_offset` points past the end of the file.
    OffsetPastEnd,
    /// `p_memsz` is smaller than `p_filesz`.
    MemSmallerThanFile,
    /// `p_memsz` is zero.
    Empty,
    /// The segment reaches into kernel space.
    NotUser,
    /// `p_vaddr + p_memsz` wraps around the address space.
    Wraparound,
    /// The segment starts in page zero.
    PageZero,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::OffsetMismatch => "file offset and address differ in page offset",
            Self::OffsetPastEnd => "file offset past end of file",
            Self::MemSmallerThanFile => "memory size smaller than file size",
            Self::Empty => "empty segment",
            Self::NotUser => "segment outside user space",
            Self::Wraparound => "segment wraps around",
            Self::PageZero => "segment maps page zero",
        };
        f.write_str(msg)
    }
}

/// The initial stack could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The arguments do not fit in the stack page.
    Overflow,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "arguments overflow the stack page"),
        }
    }
}

/// A process could not be created from a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The calling thread has no process to become the parent.
    NoParent,
    /// The command line holds no program name.
    EmptyCommand,
    /// The command line is not valid UTF-8.
    BadCommand,
    /// The executable does not exist.
    NotFound,
    /// The header or a program header is malformed.
    Elf(ElfError),
    /// The program header table lies outside the file.
    BadHeaderOffset,
    /// The file ended before a segment or table was fully read.
    ShortRead,
    /// The image needs dynamic linking, which is not supported.
    UnsupportedSegment(SegmentType),
    /// A loadable segment failed validation.
    BadSegment(SegmentError),
    /// More loadable segments than the loader can track.
    TooManySegments,
    /// The initial stack could not be built.
    Stack(StackError),
    /// A resource ran out.
    Resource(ResourceError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoParent => write!(f, "caller has no process"),
            Self::EmptyCommand => write!(f, "empty command line"),
            Self::BadCommand => write!(f, "command line is not valid UTF-8"),
            Self::NotFound => write!(f, "open failed"),
            Self::Elf(err) => write!(f, "error loading executable: {err}"),
            Self::BadHeaderOffset => write!(f, "program header table outside file"),
            Self::ShortRead => write!(f, "unexpected end of file"),
            Self::UnsupportedSegment(ty) => write!(f, "unsupported segment type {ty:?}"),
            Self::BadSegment(err) => write!(f, "bad segment: {err}"),
            Self::TooManySegments => write!(f, "too many loadable segments"),
            Self::Stack(err) => write!(f, "{err}"),
            Self::Resource(err) => write!(f, "{err}"),
        }
    }
}

impl From<ElfError> for LoadError {
    fn from(err: ElfError) -> Self {
        Self::Elf(err)
    }
}

impl From<SegmentError> for LoadError {
    fn from(err: SegmentError) -> Self {
        Self::BadSegment(err)
    }
}

impl From<StackError> for LoadError {
    fn from(err: StackError) -> Self {
        Self::Stack(err)
    }
}

impl From<ResourceError> for LoadError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

/// A syscall frame or user pointer failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The address is at or above `PHYS_BASE`.
    NotUser(VirtAddr),
    /// The address is not mapped.
    Unmapped(VirtAddr),
    /// The kernel must write to a read-only page.
    ReadOnly(VirtAddr),
    /// The range wraps around the address space.
    Overflow,
    /// A string ran into kernel space before its terminator.
    Unterminated,
    /// The syscall number is not known.
    UnknownSyscall(u32),
    /// The calling process has no user address space.
    NoAddressSpace,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUser(addr) => write!(f, "kernel address {addr}"),
            Self::Unmapped(addr) => write!(f, "unmapped address {addr}"),
            Self::ReadOnly(addr) => write!(f, "read-only page at {addr}"),
            Self::Overflow => write!(f, "range wraps around"),
            Self::Unterminated => write!(f, "unterminated string"),
            Self::UnknownSyscall(nr) => write!(f, "unknown syscall {nr}"),
            Self::NoAddressSpace => write!(f, "no user address space"),
        }
    }
}
