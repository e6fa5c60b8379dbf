//! The relocation table at the end of a [Bina](crate::bina::Bina) payload.
//!
//! Each entry is the distance from the previous pointer position divided by 4.
//! The first entry is relative to the payload start.
//! The two highest bits of the first byte select the entry size.
//!
//! | prefix | distance in bytes | entry size |
//! | ---    | ---               | ---        |
//! | `01`   | up to 64          | 1 byte     |
//! | `10`   | up to 16384       | 2 bytes    |
//! | `11`   | larger            | 4 bytes    |
//!
//! Multi byte entries are big endian.
//! The table ends with a zero byte and is padded to a multiple of 4 bytes.
use crate::{error::OffsetTableError, write::round_up};

const SMALL_MAX: u64 = 64;
const MEDIUM_MAX: u64 = 16384;

/// Encode the ascending payload relative `positions` of each pointer.
///
/// Positions should be 4 byte aligned since the lowest two bits are not stored.
pub fn write_offset_table(positions: &[u64]) -> Vec<u8> {
    let mut positions = positions.to_vec();
    positions.sort_unstable();
    positions.dedup();

    let mut bytes = Vec::new();
    let mut previous = 0;
    for position in positions {
        let distance = position - previous;
        let value = distance >> 2;
        if distance <= SMALL_MAX {
            bytes.push(0x40 | value as u8);
        } else if distance <= MEDIUM_MAX {
            bytes.extend_from_slice(&(0x8000 | value as u16).to_be_bytes());
        } else {
            bytes.extend_from_slice(&(0xC0000000 | (value as u32 & 0x3FFFFFFF)).to_be_bytes());
        }
        previous = position;
    }

    bytes.push(0);
    bytes.resize(round_up(bytes.len() as u64, 4) as usize, 0);
    bytes
}

/// Decode the payload relative position of each pointer.
pub fn read_offset_table(bytes: &[u8]) -> Result<Vec<u64>, OffsetTableError> {
    let mut positions = Vec::new();
    let mut position = 0u64;

    let mut i = 0;
    while let Some(first) = bytes.get(i).copied() {
        let value = match first >> 6 {
            0b00 => break,
            0b01 => {
                i += 1;
                (first & 0x3F) as u64
            }
            0b10 => {
                let entry = bytes
                    .get(i..i + 2)
                    .ok_or(OffsetTableError::Truncated { position: i })?;
                i += 2;
                (u16::from_be_bytes([entry[0], entry[1]]) & 0x3FFF) as u64
            }
            _ => {
                let entry = bytes
                    .get(i..i + 4)
                    .ok_or(OffsetTableError::Truncated { position: i })?;
                i += 4;
                (u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]) & 0x3FFFFFFF) as u64
            }
        };

        position += value << 2;
        positions.push(position);
    }

    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_empty() {
        assert_eq!(vec![0u8; 4], write_offset_table(&[]));
    }

    #[test]
    fn write_animation_pointers() {
        assert_eq!(
            hex!(44 46 42 00).to_vec(),
            write_offset_table(&[0x10, 0x28, 0x30])
        );
        assert_eq!(hex!(44 46 00 00).to_vec(), write_offset_table(&[0x10, 0x28]));
    }

    #[test]
    fn write_skeleton_pointers() {
        assert_eq!(
            hex!(42 48 48 4A 44 00 00 00).to_vec(),
            write_offset_table(&[0x08, 0x28, 0x48, 0x70, 0x80])
        );
    }

    #[test]
    fn small_tier() {
        let bytes = write_offset_table(&[48]);
        assert_eq!(0b01, bytes[0] >> 6);
        assert_eq!(hex!(4C 00 00 00).to_vec(), bytes);
        assert_eq!(vec![48], read_offset_table(&bytes).unwrap());
    }

    #[test]
    fn medium_tier() {
        let bytes = write_offset_table(&[1000]);
        assert_eq!(0b10, bytes[0] >> 6);
        assert_eq!(hex!(80 FA 00 00).to_vec(), bytes);
        assert_eq!(vec![1000], read_offset_table(&bytes).unwrap());
    }

    #[test]
    fn large_tier() {
        let bytes = write_offset_table(&[20000]);
        assert_eq!(0b11, bytes[0] >> 6);
        assert_eq!(hex!(C0 00 13 88 00 00 00 00).to_vec(), bytes);
        assert_eq!(vec![20000], read_offset_table(&bytes).unwrap());
    }

    #[test]
    fn tier_boundaries() {
        // The tier depends on the distance in bytes and not the stored value.
        assert_eq!(0b01, write_offset_table(&[64])[0] >> 6);
        assert_eq!(0b10, write_offset_table(&[68])[0] >> 6);
        assert_eq!(0b10, write_offset_table(&[16384])[0] >> 6);
        assert_eq!(0b11, write_offset_table(&[16388])[0] >> 6);
    }

    #[test]
    fn read_mixed_tiers() {
        let positions = vec![0x08, 0x28, 0x48, 0x400, 0x10000, 0x10010];
        assert_eq!(
            positions,
            read_offset_table(&write_offset_table(&positions)).unwrap()
        );
    }

    #[test]
    fn read_stops_at_padding() {
        assert_eq!(vec![0x10], read_offset_table(&hex!(44 00 46 46)).unwrap());
    }

    #[test]
    fn read_truncated() {
        assert!(matches!(
            read_offset_table(&hex!(44 C0 00)),
            Err(OffsetTableError::Truncated { position: 1 })
        ));
    }
}
