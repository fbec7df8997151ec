//! ELF32 executable loader.
//!
//! Only statically linked `ET_EXEC` images for i386 are accepted. The file
//! is read through [`File::read_at`] so the loader never disturbs the
//! handle's position.

use alloc::vec;

use pinion_core::addr::{PAGE_SIZE, VirtAddr};
use pinion_core::fs::File;
use pinion_core::paging::{Frame, MapFlags, PageDirectory};
use pinion_core::{kdebug, ktrace};
use pinion_elf::{ELF32_EHDR_SIZE, Elf32Header, ElfError, ProgramHeaders, SegmentType};
use planck_noalloc::vec::ArrayVec;

use super::{ExecImage, SegmentPlan, validate_segment};
use crate::config::MAX_LOAD_SEGMENTS;
use crate::error::{LoadError, ResourceError};

/// Validates the image in `file` and maps its loadable segments into
/// `page_dir`, taking fresh pages from `alloc_frame`.
///
/// Nothing is mapped unless every program header is acceptable. When
/// mapping fails halfway, the pages already installed stay in `page_dir`;
/// the caller discards them by dropping the directory.
///
/// # Errors
///
/// Returns [`LoadError`] describing the first problem found.
pub fn load_elf<F, D>(
    file: &mut F,
    page_dir: &mut D,
    mut alloc_frame: impl FnMut() -> Option<Frame>,
) -> Result<ExecImage, LoadError>
where
    F: File,
    D: PageDirectory,
{
    let mut raw = [0u8; ELF32_EHDR_SIZE];
    if file.read_at(&mut raw, 0) != ELF32_EHDR_SIZE {
        return Err(ElfError::Truncated.into());
    }
    let header = Elf32Header::parse(&raw)?;

    let file_len = file.length();
    if header.e_phoff > file_len {
        return Err(LoadError::BadHeaderOffset);
    }
    let mut table = vec![0u8; header.program_table_len()];
    if file.read_at(&mut table, header.e_phoff) != table.len() {
        return Err(LoadError::ShortRead);
    }

    let mut plans: ArrayVec<SegmentPlan, MAX_LOAD_SEGMENTS> = ArrayVec::new();
    for ph in ProgramHeaders::new(&table) {
        match ph.p_type {
            SegmentType::Load => {
                validate_segment(&ph, file_len)?;
                plans
                    .try_push(SegmentPlan::new(&ph))
                    .map_err(|_| LoadError::TooManySegments)?;
            }
            ty if ty.needs_dynamic_linking() => return Err(LoadError::UnsupportedSegment(ty)),
            _ => {}
        }
    }

    let mut heap_start = VirtAddr::new(PAGE_SIZE as u32);
    for plan in plans.iter() {
        map_segment(file, page_dir, plan, &mut alloc_frame)?;
        heap_start = heap_start.max(plan.end());
    }

    kdebug!(
        "elf: loaded {} segment(s), entry {:#010x}",
        plans.len(),
        header.e_entry
    );
    Ok(ExecImage {
        entry: VirtAddr::new(header.e_entry),
        heap_start,
    })
}

/// Maps one segment, a page at a time.
fn map_segment<F: File, D: PageDirectory>(
    file: &mut F,
    page_dir: &mut D,
    plan: &SegmentPlan,
    alloc_frame: &mut impl FnMut() -> Option<Frame>,
) -> Result<(), LoadError> {
    let mut flags = MapFlags::empty();
    if plan.writable {
        flags |= MapFlags::WRITABLE;
    }
    if plan.executable {
        flags |= MapFlags::EXECUTABLE;
    }

    let mut offset = plan.file_page;
    let mut read_left = plan.read_bytes as usize;
    let mut upage = plan.mem_page;
    for _ in 0..plan.page_count() {
        let page_read = read_left.min(PAGE_SIZE);
        let mut frame = alloc_frame().ok_or(ResourceError::OutOfPages)?;
        if file.read_at(&mut frame[..page_read], offset) != page_read {
            return Err(LoadError::ShortRead);
        }
        frame[page_read..].fill(0);

        ktrace!("elf: map {} ({} file bytes)", upage, page_read);
        page_dir
            .set_page(upage, frame, flags)
            .map_err(|_| ResourceError::MappingConflict(upage))?;

        read_left -= page_read;
        offset += page_read as u32;
        upage = VirtAddr::new(upage.as_u32() + PAGE_SIZE as u32);
    }
    Ok(())
}
