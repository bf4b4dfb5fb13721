//! Core of an RP2040 (ARMv6-M / Cortex-M0+) emulator: the Thumb/Thumb-2
//! interpreter, the address-routed MMIO bus and peripheral models, and a
//! GDB remote-serial-protocol stub that can drive either while it runs.
//!
//! The binary front-end (`src/main.rs`) is a thin consumer of this library:
//! it loads an image, builds a [`machine::build_bus`], and chooses between
//! stepping, running to completion, or handing control to a GDB client.

pub mod bus;
pub mod cpu;
pub mod emulator;
pub mod error;
pub mod gdb;
pub mod loader;
pub mod machine;
pub mod mem;
pub mod peripherals;
