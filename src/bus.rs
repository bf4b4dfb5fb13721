//! Address-routed MMU: finds the region owning an absolute address and
//! forwards a width-typed access to it.

use crate::mem::{MemoryRegion, Width};

struct Mapping {
    base: u32,
    size: u32,
    region: Box<dyn MemoryRegion>,
}

/// Insertion-ordered collection of mapped regions. Linear scan is fine: the
/// region count is small (ROM/FLASH/SRAM plus a dozen peripherals) and fixed
/// at construction time.
pub struct Bus {
    mappings: Vec<Mapping>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            mappings: Vec::new(),
        }
    }

    /// Registers `region` at `base`. Panics on overlap with an
    /// already-registered region: this is a construction-time programmer
    /// error, not a runtime condition the emulator must tolerate.
    pub fn register(&mut self, base: u32, region: Box<dyn MemoryRegion>) {
        let size = region.size();
        let new_end = u64::from(base) + u64::from(size);
        for existing in &self.mappings {
            let existing_end = u64::from(existing.base) + u64::from(existing.size);
            let overlaps = u64::from(base) < existing_end && u64::from(existing.base) < new_end;
            assert!(
                !overlaps,
                "region {:?} at {base:#x}..{new_end:#x} overlaps {:?} at {:#x}..{existing_end:#x}",
                region.name(),
                existing.region.name(),
                existing.base,
            );
        }
        self.mappings.push(Mapping { base, size, region });
    }

    fn find(&mut self, addr: u32) -> Option<(&mut Mapping, u32)> {
        self.mappings
            .iter_mut()
            .find(|m| addr >= m.base && addr < m.base.wrapping_add(m.size))
            .map(|m| {
                let offset = addr - m.base;
                (m, offset)
            })
    }

    pub fn read(&mut self, addr: u32, width: Width) -> u32 {
        match self.find(addr) {
            Some((mapping, offset)) => mapping.region.read(offset, width),
            None => {
                tracing::warn!(addr = %format!("{addr:#x}"), "read from unrouted address, returning 0");
                0
            }
        }
    }

    pub fn write(&mut self, addr: u32, value: u32, width: Width) {
        match self.find(addr) {
            Some((mapping, offset)) => mapping.region.write(offset, value, width),
            None => {
                tracing::warn!(addr = %format!("{addr:#x}"), "write to unrouted address, dropped");
            }
        }
    }

    pub fn read8(&mut self, addr: u32) -> u8 {
        self.read(addr, Width::Byte) as u8
    }
    pub fn read16(&mut self, addr: u32) -> u16 {
        self.read(addr, Width::Half) as u16
    }
    pub fn read32(&mut self, addr: u32) -> u32 {
        self.read(addr, Width::Word)
    }
    pub fn write8(&mut self, addr: u32, value: u8) {
        self.write(addr, u32::from(value), Width::Byte);
    }
    pub fn write16(&mut self, addr: u32, value: u16) {
        self.write(addr, u32::from(value), Width::Half);
    }
    pub fn write32(&mut self, addr: u32, value: u32) {
        self.write(addr, value, Width::Word);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
