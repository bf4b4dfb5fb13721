//! UF2 loader: 512-byte blocks, each self-describing its own target address
//! and payload length. A corrupt or misaligned block is logged and skipped
//! rather than aborting the whole load — a damaged block shouldn't cost the
//! rest of the image.

use std::fs;
use std::path::Path;

use crate::bus::Bus;
use crate::error::{EmulatorError, Result};

const BLOCK_SIZE: usize = 512;
const MAGIC_START0: u32 = 0x0A32_4655;
const MAGIC_START1: u32 = 0x9E5D_5157;
const MAGIC_END: u32 = 0x0AB1_6F30;
const NOT_MAIN_FLASH: u32 = 0x0000_0001;
const MAX_PAYLOAD: usize = 476;

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().expect("4-byte slice"))
}

pub fn load(path: &Path, bus: &mut Bus, base: u32, region_size: u32) -> Result<()> {
    let data = fs::read(path).map_err(|source| EmulatorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for (block_index, block) in data.chunks(BLOCK_SIZE).enumerate() {
        if block.len() < BLOCK_SIZE {
            tracing::warn!(block_index, len = block.len(), "trailing short UF2 block, ignored");
            break;
        }

        let magic_start0 = le_u32(&block[0..4]);
        let magic_start1 = le_u32(&block[4..8]);
        let flags = le_u32(&block[8..12]);
        let target_addr = le_u32(&block[12..16]);
        let payload_size = le_u32(&block[16..20]) as usize;
        let magic_end = le_u32(&block[508..512]);

        if magic_start0 != MAGIC_START0 || magic_start1 != MAGIC_START1 || magic_end != MAGIC_END {
            tracing::error!(block_index, "UF2 block has the wrong magic, skipping");
            continue;
        }
        if flags & NOT_MAIN_FLASH != 0 {
            tracing::debug!(block_index, "non-main-flash UF2 block, skipping");
            continue;
        }
        if payload_size > MAX_PAYLOAD {
            tracing::warn!(block_index, payload_size, "UF2 payload too large, skipping");
            continue;
        }
        if target_addr < base || target_addr - base + payload_size as u32 > region_size {
            tracing::warn!(block_index, target_addr = %format!("{target_addr:#x}"), "UF2 block target outside region, skipping");
            continue;
        }

        let payload = &block[32..32 + payload_size];
        for (i, byte) in payload.iter().enumerate() {
            bus.write8(target_addr + i as u32, *byte);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::ByteArrayRegion;

    fn make_block(target_addr: u32, payload: &[u8], flags: u32) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[0..4].copy_from_slice(&MAGIC_START0.to_le_bytes());
        block[4..8].copy_from_slice(&MAGIC_START1.to_le_bytes());
        block[8..12].copy_from_slice(&flags.to_le_bytes());
        block[12..16].copy_from_slice(&target_addr.to_le_bytes());
        block[16..20].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        block[32..32 + payload.len()].copy_from_slice(payload);
        block[508..512].copy_from_slice(&MAGIC_END.to_le_bytes());
        block
    }

    #[test]
    fn valid_block_copies_payload_to_its_target_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.uf2");
        let block = make_block(0x1000_0010, &[0xAA, 0xBB, 0xCC, 0xDD], 0);
        fs::write(&path, &block).unwrap();

        let mut bus = Bus::new();
        bus.register(0x1000_0000, Box::new(ByteArrayRegion::new("flash", 0x1000, 0)));
        load(&path, &mut bus, 0x1000_0000, 0x1000).unwrap();

        assert_eq!(bus.read32(0x1000_0010), 0xDDCC_BBAA);
    }

    #[test]
    fn corrupt_magic_block_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.uf2");
        let mut bad = make_block(0x1000_0000, &[0x11], 0);
        bad[0] = 0; // corrupt magic0
        let good = make_block(0x1000_0004, &[0x22], 0);
        let mut all = bad;
        all.extend(good);
        fs::write(&path, &all).unwrap();

        let mut bus = Bus::new();
        bus.register(0x1000_0000, Box::new(ByteArrayRegion::new("flash", 0x1000, 0)));
        load(&path, &mut bus, 0x1000_0000, 0x1000).unwrap();

        assert_eq!(bus.read8(0x1000_0000), 0);
        assert_eq!(bus.read8(0x1000_0004), 0x22);
    }

    #[test]
    fn not_main_flash_block_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.uf2");
        let block = make_block(0x1000_0000, &[0x55], NOT_MAIN_FLASH);
        fs::write(&path, &block).unwrap();

        let mut bus = Bus::new();
        bus.register(0x1000_0000, Box::new(ByteArrayRegion::new("flash", 0x1000, 0)));
        load(&path, &mut bus, 0x1000_0000, 0x1000).unwrap();

        assert_eq!(bus.read8(0x1000_0000), 0);
    }
}
