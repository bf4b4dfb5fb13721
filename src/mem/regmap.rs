use super::{MemoryRegion, Width};

/// A peripheral's own register semantics, addressed by a 4-byte-aligned
/// offset within the map. `None`/`false` mean "no such register" — the
/// caller logs and treats the access as a no-op, it never faults.
pub trait Registers {
    fn read_reg(&mut self, offset: u32) -> Option<u32>;
    /// Returns whether `offset` names a writable register.
    fn write_reg(&mut self, offset: u32, value: u32) -> bool;
}

/// Hook-dispatched MMIO register block: byte/halfword narrow-write
/// replication, optional RP2040 atomic-alias composition, then dispatch to
/// the peripheral's own `Registers` impl.
pub struct RegisterMap<R: Registers> {
    name: String,
    size: u32,
    atomic_writes: bool,
    regs: R,
}

const ATOMIC_XOR: u32 = 0x1000;
const ATOMIC_SET: u32 = 0x2000;
const ATOMIC_CLR: u32 = 0x3000;
const ATOMIC_OP_MASK: u32 = 0x3000;

impl<R: Registers> RegisterMap<R> {
    pub fn new(name: impl Into<String>, size: u32, atomic_writes: bool, regs: R) -> Self {
        Self {
            name: name.into(),
            size,
            atomic_writes,
            regs,
        }
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }
}

impl<R: Registers> MemoryRegion for RegisterMap<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn read(&mut self, offset: u32, width: Width) -> u32 {
        let aligned = offset & !3;
        let value = match self.regs.read_reg(aligned) {
            Some(v) => v,
            None => {
                tracing::warn!(region = %self.name, offset = %format!("{aligned:#x}"), "read of unhooked register, returning 0");
                0
            }
        };
        narrow_slice(value, offset, width)
    }

    fn write(&mut self, offset: u32, value: u32, width: Width) {
        let unaligned = offset;
        let aligned = offset & !3;
        // Step 2: narrow-write replication into all lanes before anything else.
        let replicated = replicate(value, unaligned, width);

        let target_offset = if self.atomic_writes {
            let op = aligned & ATOMIC_OP_MASK;
            let base_offset = aligned & !ATOMIC_OP_MASK;
            if op != 0 {
                let current = self.regs.read_reg(base_offset).unwrap_or(0);
                let combined = match op {
                    ATOMIC_XOR => current ^ replicated,
                    ATOMIC_SET => current | replicated,
                    ATOMIC_CLR => current & !replicated,
                    _ => unreachable!("op masked to one of XOR/SET/CLR/plain"),
                };
                if !self.regs.write_reg(base_offset, combined) {
                    tracing::warn!(region = %self.name, offset = %format!("{base_offset:#x}"), "write to unhooked register, ignored");
                }
                return;
            }
            base_offset
        } else {
            aligned
        };

        if !self.regs.write_reg(target_offset, replicated) {
            tracing::warn!(region = %self.name, offset = %format!("{target_offset:#x}"), "write to unhooked register, ignored");
        }
    }
}

fn replicate(value: u32, unaligned_offset: u32, width: Width) -> u32 {
    match width {
        Width::Word => value,
        Width::Half => {
            let half = value as u16;
            u32::from(half) | (u32::from(half) << 16)
        }
        Width::Byte => {
            let _ = unaligned_offset;
            let byte = value as u8;
            u32::from_le_bytes([byte, byte, byte, byte])
        }
    }
}

fn narrow_slice(value: u32, offset: u32, width: Width) -> u32 {
    match width {
        Width::Word => value,
        Width::Half => {
            let lane = (offset & 2) * 8;
            (value >> lane) & 0xFFFF
        }
        Width::Byte => {
            let lane = (offset & 3) * 8;
            (value >> lane) & 0xFF
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Toy {
        value: u32,
    }

    impl Registers for Toy {
        fn read_reg(&mut self, offset: u32) -> Option<u32> {
            (offset == 0x30).then_some(self.value)
        }
        fn write_reg(&mut self, offset: u32, value: u32) -> bool {
            if offset == 0x30 {
                self.value = value;
                true
            } else {
                false
            }
        }
    }

    #[test]
    fn atomic_alias_xor_set_clear() {
        let mut map = RegisterMap::new("toy", 0x4000, true, Toy { value: 0 });
        map.write(0x30, 0x0000_00FF, Width::Word);
        assert_eq!(map.read(0x30, Width::Word), 0xFF);

        map.write(0x1000 + 0x30, 0x0F, Width::Word);
        assert_eq!(map.read(0x30, Width::Word), 0xF0);

        map.write(0x2000 + 0x30, 0x0F, Width::Word);
        assert_eq!(map.read(0x30, Width::Word), 0xFF);

        map.write(0x3000 + 0x30, 0x0F, Width::Word);
        assert_eq!(map.read(0x30, Width::Word), 0xF0);
    }

    #[test]
    fn unhooked_register_is_silent_noop() {
        let mut map = RegisterMap::new("toy", 0x4000, false, Toy { value: 7 });
        map.write(0x40, 0xFFFF_FFFF, Width::Word);
        assert_eq!(map.read(0x40, Width::Word), 0);
        assert_eq!(map.read(0x30, Width::Word), 7);
    }

    #[test]
    fn byte_write_replicates_into_all_lanes() {
        let mut map = RegisterMap::new("toy", 0x4000, false, Toy { value: 0 });
        map.write(0x30, 0xAB, Width::Byte);
        assert_eq!(map.read(0x30, Width::Word), 0xABAB_ABAB);
    }
}
