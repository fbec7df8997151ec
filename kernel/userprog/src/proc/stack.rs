//! Initial user stack construction.
//!
//! The stack occupies the single page just below [`PHYS_BASE`]. On entry a
//! process sees the frame a C `main(argc, argv)` expects:
//!
//! ```text
//!   PHYS_BASE  ┌──────────────────────────┐
//!              │ "bb\0"                    │  argument strings, argv[0]
//!              │ "a\0"                     │  lowest
//!              │ "prog\0"                  │
//!              ├──────────────────────────┤
//!              │ padding                   │  to 16-byte alignment
//!              ├──────────────────────────┤
//!              │ NULL                      │  argv[argc]
//!              │ argv[argc-1] .. argv[0]   │  string pointers
//!              │ argv                      │  = esp + 12
//!              │ argc                      │
//!   esp  ───►  │ 0                         │  fake return address
//!              └──────────────────────────┘
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use pinion_core::addr::{PAGE_SIZE, PHYS_BASE, VirtAddr};
use pinion_core::paging::{Frame, MapFlags, PageDirectory};

use crate::error::{LoadError, ResourceError, StackError};

/// User address of the stack page.
pub const STACK_PAGE: VirtAddr = VirtAddr::new(PHYS_BASE - PAGE_SIZE as u32);

/// Alignment of the initial stack pointer.
const STACK_ALIGN: u32 = 16;

fn put_word(page: &mut [u8], offset: usize, word: u32) {
    page[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
}

/// Lays out `argv` in `page`, which will be mapped at [`STACK_PAGE`], and
/// returns the initial stack pointer.
///
/// # Errors
///
/// Returns [`StackError::Overflow`] if the strings and the pointer block do
/// not fit in one page.
pub fn build_stack(page: &mut [u8], argv: &[String]) -> Result<VirtAddr, StackError> {
    let base = STACK_PAGE.as_u32();
    let mut cursor = page.len();

    // Strings go in back to front so argv[0] ends up lowest.
    let mut addrs: Vec<u32> = Vec::with_capacity(argv.len());
    for arg in argv.iter().rev() {
        let len = arg.len() + 1;
        cursor = cursor.checked_sub(len).ok_or(StackError::Overflow)?;
        page[cursor..cursor + arg.len()].copy_from_slice(arg.as_bytes());
        page[cursor + arg.len()] = 0;
        addrs.push(base + cursor as u32);
    }
    addrs.reverse();

    let argc = argv.len();
    let words = argc.checked_add(4).ok_or(StackError::Overflow)?;
    let top = cursor.checked_sub(words * 4).ok_or(StackError::Overflow)?;
    // The page is mapped page aligned, so aligning the offset aligns the address.
    let esp = VirtAddr::new(top as u32).align_down(STACK_ALIGN).as_u32() as usize;

    let argv_ptr = esp + 12;
    put_word(page, esp, 0);
    put_word(page, esp + 4, argc as u32);
    put_word(page, esp + 8, base + argv_ptr as u32);
    for (i, addr) in addrs.iter().enumerate() {
        put_word(page, argv_ptr + 4 * i, *addr);
    }
    put_word(page, argv_ptr + 4 * argc, 0);

    Ok(VirtAddr::new(base + esp as u32))
}

/// Builds the stack for `argv` in `frame` and maps it writable at
/// [`STACK_PAGE`].
///
/// # Errors
///
/// Fails if the arguments overflow the page or the page is already mapped.
pub fn setup_stack<D: PageDirectory>(
    page_dir: &mut D,
    argv: &[String],
    mut frame: Frame,
) -> Result<VirtAddr, LoadError> {
    frame.fill(0);
    let esp = build_stack(&mut frame, argv)?;
    page_dir
        .set_page(STACK_PAGE, frame, MapFlags::WRITABLE)
        .map_err(|_| ResourceError::MappingConflict(STACK_PAGE))?;
    Ok(esp)
}
