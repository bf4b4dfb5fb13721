//! Raw binary loader: the whole file, copied verbatim into the bus starting
//! at `base`. No header, no interpretation.

use std::fs;
use std::path::Path;

use crate::bus::Bus;
use crate::error::{EmulatorError, Result};

pub fn load(path: &Path, bus: &mut Bus, base: u32, region_size: u32) -> Result<()> {
    let data = fs::read(path).map_err(|source| EmulatorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if data.len() as u64 > u64::from(region_size) {
        return Err(EmulatorError::ImageTooLarge {
            size: data.len(),
            region_size: region_size as usize,
            offset: 0,
        });
    }
    for (i, byte) in data.iter().enumerate() {
        bus.write8(base + i as u32, *byte);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::ByteArrayRegion;

    #[test]
    fn copies_file_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, [1u8, 2, 3, 4]).unwrap();

        let mut bus = Bus::new();
        bus.register(0x1000_0000, Box::new(ByteArrayRegion::new("flash", 0x1000, 0)));
        load(&path, &mut bus, 0x1000_0000, 0x1000).unwrap();

        assert_eq!(bus.read32(0x1000_0000), 0x0403_0201);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, vec![0u8; 8]).unwrap();

        let mut bus = Bus::new();
        bus.register(0x1000_0000, Box::new(ByteArrayRegion::new("flash", 4, 0)));
        let err = load(&path, &mut bus, 0x1000_0000, 4).unwrap_err();
        assert!(matches!(err, EmulatorError::ImageTooLarge { .. }));
    }
}
