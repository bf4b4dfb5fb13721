//! Firmware image loaders: raw binary and UF2. Both copy bytes into the
//! [`crate::bus::Bus`] at a target offset; neither interprets the loaded
//! bytes as instructions.

pub mod binary;
pub mod uf2;

use std::path::Path;

use crate::bus::Bus;
use crate::error::Result;

/// Loads `path` into `bus` at `base`, picking the raw or UF2 loader by the
/// file's extension (`.uf2`, case-insensitive, selects UF2). `region_size`
/// bounds a raw-binary load against [`crate::error::EmulatorError::ImageTooLarge`];
/// UF2 blocks carry their own target address and are bounds-checked per block.
pub fn load_image(path: &Path, bus: &mut Bus, base: u32, region_size: u32) -> Result<()> {
    let is_uf2 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("uf2"));
    if is_uf2 {
        uf2::load(path, bus, base, region_size)
    } else {
        binary::load(path, bus, base, region_size)
    }
}
