//! RESETS: a single status word reporting that every reset-controlled block
//! has completed reset. No block is ever actually held in reset by this
//! core, so the value is constant.

use crate::mem::Registers;

const RESET_DONE: u32 = 0x8;
const RESET_DONE_BITS: u32 = 0x01ff_ffff;

#[derive(Default)]
pub struct Resets;

impl Registers for Resets {
    fn read_reg(&mut self, offset: u32) -> Option<u32> {
        (offset == RESET_DONE).then_some(RESET_DONE_BITS)
    }

    fn write_reg(&mut self, _offset: u32, _value: u32) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_done_reads_all_blocks_done() {
        let mut r = Resets;
        assert_eq!(r.read_reg(RESET_DONE), Some(RESET_DONE_BITS));
    }

    #[test]
    fn other_offsets_are_unhooked() {
        let mut r = Resets;
        assert_eq!(r.read_reg(0x0), None);
        assert!(!r.write_reg(RESET_DONE, 0));
    }
}
