//! Typed 32-bit virtual addresses.
//!
//! User programs run in the low part of a 32-bit address space; everything
//! at or above [`PHYS_BASE`] belongs to the kernel. [`VirtAddr`] carries the
//! page arithmetic the loader, stack builder and pointer validator share.

use core::fmt;

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Mask for the 12-bit page offset.
const PAGE_OFFSET_MASK: u32 = 0xFFF;

/// First kernel virtual address. User addresses are strictly below it.
pub const PHYS_BASE: u32 = 0xC000_0000;

/// A 32-bit virtual address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u32);

impl VirtAddr {
    /// Creates a new `VirtAddr`.
    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Returns the zero address.
    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw `u32` value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns `true` if this is a user address (below [`PHYS_BASE`]).
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < PHYS_BASE
    }

    /// Returns the offset of this address within its page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        (self.0 & PAGE_OFFSET_MASK) as usize
    }

    /// Rounds down to the start of the containing page.
    #[inline]
    pub const fn page_round_down(self) -> Self {
        Self(self.0 & !PAGE_OFFSET_MASK)
    }

    /// Rounds up to the next page boundary, or `None` on overflow.
    #[inline]
    pub const fn page_round_up(self) -> Option<Self> {
        match self.0.checked_add(PAGE_OFFSET_MASK) {
            Some(v) => Some(Self(v & !PAGE_OFFSET_MASK)),
            None => None,
        }
    }

    /// Adds `offset` bytes, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: u32) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtracts `offset` bytes, returning `None` on underflow.
    #[inline]
    pub const fn checked_sub(self, offset: u32) -> Option<Self> {
        match self.0.checked_sub(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Rounds down to a multiple of `align`, which must be a power of two.
    #[inline]
    pub const fn align_down(self, align: u32) -> Self {
        debug_assert!(align.is_power_of_two());
        Self(self.0 & !(align - 1))
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Iterator over the page-aligned addresses of every page touched by the
/// byte range `[start, start + len)`.
///
/// Yields nothing for an empty range. The range must not overflow.
pub fn pages_spanning(start: VirtAddr, len: u32) -> impl Iterator<Item = VirtAddr> {
    let first = start.page_round_down().as_u32();
    let last = if len == 0 {
        None
    } else {
        start
            .checked_add(len - 1)
            .map(|end| end.page_round_down().as_u32())
    };
    let count = last.map_or(0, |last| (last - first) / PAGE_SIZE as u32 + 1);
    (0..count).map(move |i| VirtAddr::new(first + i * PAGE_SIZE as u32))
}
