//! SIO: single-cycle I/O. Only what boot firmware and the SDK's hardware
//! divider depend on is modeled — GPIO set/clear is logged rather than
//! driving any real pin, `CPUID` is pinned to 0 (single core), and
//! `GPIO_HI_IN` is pinned to 2 so the boot ROM takes the flash-boot path.

use crate::mem::Registers;

const CPUID: u32 = 0x00;
const GPIO_HI_IN: u32 = 0x08;
const GPIO_OUT_SET: u32 = 0x14;
const GPIO_OUT_CLR: u32 = 0x18;
const DIV_UDIVIDEND: u32 = 0x60;
const DIV_UDIVISOR: u32 = 0x64;
const DIV_QUOTIENT: u32 = 0x70;
const DIV_REMAINDER: u32 = 0x74;
const DIV_CSR: u32 = 0x78;
const SPINLOCK_BASE: u32 = 0x100;
const SPINLOCK_COUNT: u32 = 32;

const GPIO_HI_IN_VALUE: u32 = 2;

fn pin_list(mask: u32) -> Vec<u32> {
    (0..32).filter(|i| mask & (1 << i) != 0).collect()
}

pub struct Sio {
    dividend: u32,
    divisor: u32,
    quotient: u32,
    remainder: u32,
    div_ready: bool,
    spinlock_held: [bool; SPINLOCK_COUNT as usize],
}

impl Default for Sio {
    fn default() -> Self {
        Self {
            dividend: 0,
            divisor: 0,
            quotient: 0,
            remainder: 0,
            div_ready: true,
            spinlock_held: [false; SPINLOCK_COUNT as usize],
        }
    }
}

impl Sio {
    fn do_division(&mut self) {
        self.div_ready = false;
        if self.divisor != 0 {
            self.quotient = self.dividend / self.divisor;
            self.remainder = self.dividend % self.divisor;
            self.div_ready = true;
        }
    }

    fn spinlock_index(offset: u32) -> Option<usize> {
        if offset < SPINLOCK_BASE {
            return None;
        }
        let idx = (offset - SPINLOCK_BASE) / 4;
        (idx < SPINLOCK_COUNT).then_some(idx as usize)
    }
}

impl Registers for Sio {
    fn read_reg(&mut self, offset: u32) -> Option<u32> {
        if let Some(i) = Self::spinlock_index(offset) {
            return Some(if self.spinlock_held[i] {
                0
            } else {
                self.spinlock_held[i] = true;
                1 << i
            });
        }
        match offset {
            CPUID => Some(0),
            GPIO_HI_IN => Some(GPIO_HI_IN_VALUE),
            DIV_QUOTIENT => Some(self.quotient),
            DIV_REMAINDER => Some(self.remainder),
            DIV_CSR => Some(u32::from(self.div_ready)),
            _ => None,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) -> bool {
        if let Some(i) = Self::spinlock_index(offset) {
            self.spinlock_held[i] = false;
            return true;
        }
        match offset {
            GPIO_OUT_SET => {
                tracing::info!(pins = ?pin_list(value), "GPIO pins set to HIGH");
                true
            }
            GPIO_OUT_CLR => {
                tracing::info!(pins = ?pin_list(value), "GPIO pins set to LOW");
                true
            }
            DIV_UDIVIDEND => {
                self.dividend = value;
                self.do_division();
                true
            }
            DIV_UDIVISOR => {
                self.divisor = value;
                self.do_division();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpuid_and_gpio_hi_in_are_pinned() {
        let mut sio = Sio::default();
        assert_eq!(sio.read_reg(CPUID), Some(0));
        assert_eq!(sio.read_reg(GPIO_HI_IN), Some(2));
    }

    #[test]
    fn unsigned_divider_computes_quotient_and_remainder() {
        let mut sio = Sio::default();
        sio.write_reg(DIV_UDIVIDEND, 17);
        sio.write_reg(DIV_UDIVISOR, 5);
        assert_eq!(sio.read_reg(DIV_QUOTIENT), Some(3));
        assert_eq!(sio.read_reg(DIV_REMAINDER), Some(2));
        assert_eq!(sio.read_reg(DIV_CSR), Some(1));
    }

    #[test]
    fn division_by_zero_leaves_not_ready() {
        let mut sio = Sio::default();
        sio.write_reg(DIV_UDIVIDEND, 17);
        sio.write_reg(DIV_UDIVISOR, 0);
        assert_eq!(sio.read_reg(DIV_CSR), Some(0));
    }

    #[test]
    fn spinlock_is_one_shot_until_released() {
        let mut sio = Sio::default();
        assert_eq!(sio.read_reg(SPINLOCK_BASE + 4 * 5), Some(1 << 5));
        assert_eq!(sio.read_reg(SPINLOCK_BASE + 4 * 5), Some(0));
        sio.write_reg(SPINLOCK_BASE + 4 * 5, 0);
        assert_eq!(sio.read_reg(SPINLOCK_BASE + 4 * 5), Some(1 << 5));
    }
}
