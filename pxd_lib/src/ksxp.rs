//! Skeletons in `.skl.pxd` files.
//!
//! # File Layout
//! The payload starts with the header and three table descriptors.
//! The tables follow in the same order with the bone names stored at the end as the string table.
//!
//! | table | alignment | entry size |
//! | --- | --- | --- |
//! | parent indices | 8 | 2 |
//! | name offsets | 16 | 16 |
//! | rest transforms | 16 | 48 |
//! | names | 4 | variable |
use std::io::Cursor;

use binrw::{binread, BinRead, BinReaderExt, BinResult, BinWrite};

use crate::{
    bina::Bina,
    parse_offset64_count64, parse_string_ptr64,
    write::{Offset, PayloadWriter},
};

pub const VERSION: u32 = 512;

/// The payload relative offset of the parent index table.
/// This follows the fixed size header.
pub const PARENT_TABLE_OFFSET: u64 = 104;

#[binread]
#[derive(Debug, PartialEq, Clone)]
#[br(magic(b"KSXP"))]
pub struct Ksxp {
    #[br(temp, assert(version == VERSION, "unsupported skeleton version {}", version))]
    version: u32,

    #[br(temp, restore_position)]
    #[br(assert(
        parent_table_offset == PARENT_TABLE_OFFSET,
        "unexpected parent table offset {}",
        parent_table_offset
    ))]
    parent_table_offset: u64,

    /// The index of the parent bone or -1 for root bones.
    #[br(parse_with = parse_offset64_count64)]
    pub parent_indices: Vec<i16>,

    #[br(parse_with = parse_offset64_count64)]
    pub names: Vec<BoneName>,

    /// The rest pose transform of each bone relative to its parent.
    #[br(parse_with = parse_offset64_count64)]
    pub transforms: Vec<RestTransform>,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct BoneName {
    #[br(parse_with = parse_string_ptr64)]
    #[br(pad_after = 8)]
    pub name: String,
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy)]
pub struct RestTransform {
    #[brw(pad_after = 4)]
    pub translation: [f32; 3],
    /// The quaternion as xyzw.
    pub rotation: [f32; 4],
    #[brw(pad_after = 4)]
    pub scale: [f32; 3],
}

impl Ksxp {
    /// Read the skeleton from the payload of `bina`.
    pub fn from_bina(bina: &Bina) -> BinResult<Self> {
        Cursor::new(&bina.payload).read_le()
    }

    /// Lay out the tables and names in a new container.
    pub fn to_bina(&self) -> BinResult<Bina> {
        let mut writer = PayloadWriter::new();
        writer.write_bytes(b"KSXP")?;
        writer.write(&VERSION)?;

        let parent_table = write_descriptor(&mut writer, self.parent_indices.len())?;
        let name_table = write_descriptor(&mut writer, self.names.len())?;
        let transform_table = write_descriptor(&mut writer, self.transforms.len())?;

        parent_table.set_here(&mut writer)?;
        for index in &self.parent_indices {
            writer.write(index)?;
        }
        writer.pad_to(8)?;

        name_table.set_here(&mut writer)?;
        let mut name_offsets = Vec::new();
        for _ in &self.names {
            name_offsets.push(writer.offset_placeholder()?);
            writer.write(&0u64)?;
        }
        writer.pad_to(16)?;

        transform_table.set_here(&mut writer)?;
        for transform in &self.transforms {
            writer.write(transform)?;
        }

        // Names are stored in bone order without deduplication.
        let string_table_offset = writer.position();
        for (name, offset) in self.names.iter().zip(name_offsets) {
            offset.set_here(&mut writer)?;
            writer.write_bytes(name.name.as_bytes())?;
            writer.write_bytes(&[0u8])?;
        }
        writer.pad_to(4)?;

        let (payload, pointers) = writer.finish();
        Ok(Bina::new(payload, string_table_offset as u32, pointers))
    }
}

fn write_descriptor(writer: &mut PayloadWriter, count: usize) -> BinResult<Offset> {
    let offset = writer.offset_placeholder()?;
    writer.write(&(count as u64))?;
    writer.write(&(count as u64))?;
    writer.write(&0u64)?;
    Ok(offset)
}
