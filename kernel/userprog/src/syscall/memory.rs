//! Heap break management.

use alloc::vec::Vec;

use pinion_core::addr::{PAGE_SIZE, VirtAddr};
use pinion_core::kdebug;
use pinion_core::paging::{Frame, MapFlags, PageDirectory};

use crate::Kernel;
use crate::platform::Platform;
use crate::proc::stack::STACK_PAGE;
use crate::proc::{Heap, Process};

/// Moves the break of `heap` by `increment`, mapping or unmapping pages in
/// `page_dir`. Returns the old break.
///
/// The break must stay within `[heap.start, STACK_PAGE]`. When a page cannot
/// be obtained, every page this call mapped is released again and the break
/// is left where it was.
pub(crate) fn move_break<D: PageDirectory>(
    heap: &mut Heap,
    page_dir: &mut D,
    increment: i32,
    mut alloc_frame: impl FnMut() -> Option<Frame>,
) -> Option<VirtAddr> {
    let old = heap.brk;
    let target = i64::from(old.as_u32()) + i64::from(increment);
    if target < i64::from(heap.start.as_u32()) || target > i64::from(STACK_PAGE.as_u32()) {
        return None;
    }
    let new = VirtAddr::new(u32::try_from(target).ok()?);

    let old_top = old.page_round_up()?.as_u32();
    let new_top = new.page_round_up()?.as_u32();
    if new_top > old_top {
        let mut mapped: Vec<VirtAddr> = Vec::new();
        for page in (old_top..new_top).step_by(PAGE_SIZE) {
            let page = VirtAddr::new(page);
            let installed = alloc_frame().and_then(|mut frame| {
                frame.fill(0);
                page_dir.set_page(page, frame, MapFlags::WRITABLE).ok()
            });
            if installed.is_none() {
                for page in mapped {
                    drop(page_dir.clear_page(page));
                }
                return None;
            }
            mapped.push(page);
        }
    } else {
        for page in (new_top..old_top).step_by(PAGE_SIZE) {
            drop(page_dir.clear_page(VirtAddr::new(page)));
        }
    }

    heap.brk = new;
    Some(old)
}

impl<P: Platform> Kernel<P> {
    #[expect(clippy::cast_possible_wrap, reason = "the old break is returned as a user pointer")]
    pub(super) fn sys_sbrk(&self, process: &Process<P>, increment: i32) -> i32 {
        let mut heap = process.heap();
        let moved = process
            .with_page_dir(|page_dir| {
                move_break(&mut heap, page_dir, increment, || {
                    self.platform().alloc_user_frame()
                })
            })
            .flatten();
        match moved {
            Some(old) => old.as_u32() as i32,
            None => {
                kdebug!("sbrk: pid {} cannot move break by {}", process.pid(), increment);
                -1
            }
        }
    }
}
