//! In-memory page directory and file used by unit tests.

use std::collections::BTreeMap;

use pinion_core::addr::VirtAddr;
use pinion_core::fs::File;
use pinion_core::paging::{Frame, MapFlags, PageDirectory};

#[derive(Default)]
pub struct MapPageDir {
    pages: BTreeMap<VirtAddr, (Frame, MapFlags)>,
}

impl MapPageDir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapped(&self) -> usize {
        self.pages.len()
    }

    /// Maps a zeroed page at `upage`.
    pub fn map_zeroed(&mut self, upage: VirtAddr, flags: MapFlags) {
        assert!(self.set_page(upage, Frame::zeroed(), flags).is_ok());
    }

    /// Copies `bytes` to user address `addr`. The pages must be mapped.
    pub fn poke(&mut self, addr: VirtAddr, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let at = VirtAddr::new(addr.as_u32() + i as u32);
            let frame = self.page_mut(at.page_round_down()).expect("poke unmapped");
            frame[at.page_offset()] = b;
        }
    }

    /// Reads `len` bytes from user address `addr`.
    pub fn peek(&self, addr: VirtAddr, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let at = VirtAddr::new(addr.as_u32() + i as u32);
                self.page(at.page_round_down()).expect("peek unmapped")[at.page_offset()]
            })
            .collect()
    }
}

impl PageDirectory for MapPageDir {
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

/// A file backed by a byte vector.
pub struct VecFile {
    data: Vec<u8>,
    pos: u32,
    denied: bool,
}

impl VecFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            denied: false,
        }
    }

    pub fn is_write_denied(&self) -> bool {
        self.denied
    }
}

impl File for VecFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.read_at(buf, self.pos);
        self.pos += n as u32;
        n
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u32) -> usize {
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if self.denied {
            return 0;
        }
        let start = self.pos as usize;
        if self.data.len() < start + buf.len() {
            self.data.resize(start + buf.len(), 0);
        }
        self.data[start..start + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u32;
        buf.len()
    }

    fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn length(&self) -> u32 {
        self.data.len() as u32
    }

    fn deny_write(&mut self) {
        self.denied = true;
    }

    fn allow_write(&mut self) {
        self.denied = false;
    }
}
