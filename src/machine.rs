//! Wires the byte-addressed RAM/ROM/FLASH regions and every peripheral
//! register map onto one [`Bus`], at their real RP2040 addresses. This is
//! the "front-end builds the CPU, registering all peripherals with the bus"
//! step every caller (the CLI binary, and the GDB integration tests) shares.

use crate::bus::Bus;
use crate::mem::{ByteArrayRegion, RegisterMap};
use crate::peripherals::{
    clocks::Clocks, cortex::Cortex, pll::Pll, resets::Resets, sio::Sio, timer::Timer,
    uart::{Uart, UartSink},
    xip_ssi::XipSsi,
    xosc::Xosc,
    CLOCKS_BASE, CLOCKS_SIZE, CORTEX_BASE, CORTEX_SIZE, PLL_SIZE, PLL_SYS_BASE, PLL_USB_BASE,
    RESETS_BASE, RESETS_SIZE, SIO_BASE, SIO_SIZE, TIMER_BASE, TIMER_SIZE, UART0_BASE, UART0_SIZE,
    XIP_SSI_BASE, XIP_SSI_SIZE, XOSC_BASE, XOSC_SIZE,
};

pub const ROM_BASE: u32 = 0x0000_0000;
pub const ROM_SIZE: u32 = 16 * 1024;
pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_SIZE: u32 = 16 * 1024 * 1024;
pub const SRAM_BASE: u32 = 0x2000_0000;
pub const SRAM_SIZE: u32 = 264 * 1024;

/// Builds a bus with ROM, FLASH, SRAM, and every modeled peripheral
/// registered at its real address. `uart_sink` receives bytes written to
/// `UART0_DR` — the CLI wires this to stdout or an opened serial device.
pub fn build_bus<S: UartSink + 'static>(uart_sink: S) -> Bus {
    let mut bus = Bus::new();
    bus.register(ROM_BASE, Box::new(ByteArrayRegion::new("rom", ROM_SIZE, 0x00)));
    bus.register(FLASH_BASE, Box::new(ByteArrayRegion::new("flash", FLASH_SIZE, 0xFF)));
    bus.register(SRAM_BASE, Box::new(ByteArrayRegion::new("sram", SRAM_SIZE, 0x00)));

    bus.register(
        XIP_SSI_BASE,
        Box::new(RegisterMap::new("xip_ssi", XIP_SSI_SIZE, false, XipSsi::default())),
    );
    bus.register(
        RESETS_BASE,
        Box::new(RegisterMap::new("resets", RESETS_SIZE, false, Resets)),
    );
    bus.register(
        CLOCKS_BASE,
        Box::new(RegisterMap::new("clocks", CLOCKS_SIZE, true, Clocks::default())),
    );
    bus.register(XOSC_BASE, Box::new(RegisterMap::new("xosc", XOSC_SIZE, false, Xosc)));
    bus.register(PLL_SYS_BASE, Box::new(RegisterMap::new("pll_sys", PLL_SIZE, false, Pll)));
    bus.register(PLL_USB_BASE, Box::new(RegisterMap::new("pll_usb", PLL_SIZE, false, Pll)));
    bus.register(
        UART0_BASE,
        Box::new(RegisterMap::new("uart0", UART0_SIZE, false, Uart::new(uart_sink))),
    );
    bus.register(
        TIMER_BASE,
        Box::new(RegisterMap::new("timer", TIMER_SIZE, false, Timer::default())),
    );
    bus.register(SIO_BASE, Box::new(RegisterMap::new("sio", SIO_SIZE, false, Sio::default())));
    bus.register(
        CORTEX_BASE,
        Box::new(RegisterMap::new("cortex", CORTEX_SIZE, false, Cortex::default())),
    );

    bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::uart::UartSink;

    #[derive(Default)]
    struct NullSink;
    impl UartSink for NullSink {
        fn write_byte(&mut self, _byte: u8) {}
    }

    #[test]
    fn every_region_is_reachable_and_non_overlapping() {
        let mut bus = build_bus(NullSink);
        assert_eq!(bus.read32(ROM_BASE), 0);
        assert_eq!(bus.read8(FLASH_BASE), 0xFF);
        assert_eq!(bus.read32(SRAM_BASE), 0);
        assert_eq!(bus.read32(crate::peripherals::RESETS_BASE + 0x8), 0x01ff_ffff);
    }
}
