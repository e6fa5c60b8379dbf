//! The `BINA210L` container used for `.skl.pxd` and `.anm.pxd` files.
//!
//! The container is a 16 byte header followed by a single `DATA` section.
//! The section's payload always starts at [PAYLOAD_OFFSET] and ends with a relocation table
//! listing the position of every pointer in the payload.
use std::io::{Read, Seek, Write};

use binrw::{binread, BinRead, BinResult, BinWrite};

use crate::offset_table::{read_offset_table, write_offset_table};

/// The absolute position of the payload in the file.
/// All payload pointers are relative to this position.
pub const PAYLOAD_OFFSET: u64 = 0x40;

const DATA_HEADER_SIZE: u32 = 0x30;
const ADDITIONAL_HEADER_SIZE: u32 = 0x18;

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
#[brw(magic(b"BINA210L"))]
pub struct BinaHeader {
    /// The size of the entire file in bytes.
    pub file_size: u32,
    #[br(assert(section_count == 1, "unexpected section count {}", section_count))]
    pub section_count: u32,
}

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
#[brw(magic(b"DATA"))]
pub struct DataHeader {
    /// The size of the section including this header.
    pub data_size: u32,
    /// The start of the string table relative to the payload.
    pub string_table_offset: u32,
    pub string_table_size: u32,
    /// The size of the offset table including padding.
    pub offset_table_size: u32,
    #[br(assert(additional_header_size == ADDITIONAL_HEADER_SIZE))]
    #[brw(pad_after = 0x18)]
    pub additional_header_size: u32,
}

/// The kind of payload stored in a [Bina] based on its magic.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::Display)]
pub enum FileKind {
    /// A [Ksxp](crate::ksxp::Ksxp) skeleton.
    Skeleton,
    /// A [Naxp](crate::naxp::Naxp) animation.
    Animation,
}

#[binread]
#[derive(Debug, PartialEq, Clone)]
pub struct Bina {
    #[br(temp)]
    header: BinaHeader,

    #[br(temp)]
    data: DataHeader,

    /// The file size from the header.
    /// This is recalculated when writing.
    #[br(calc = header.file_size)]
    pub file_size: u32,

    /// The start of the string table in [payload](#structfield.payload).
    #[br(calc = data.string_table_offset)]
    pub string_table_offset: u32,

    /// The bytes from [PAYLOAD_OFFSET] up to the end of the string table.
    #[br(count = data.string_table_offset as usize + data.string_table_size as usize)]
    pub payload: Vec<u8>,

    /// The payload relative position of each pointer in the payload in ascending order.
    #[br(parse_with = parse_offset_table, args(data.offset_table_size))]
    pub pointers: Vec<u64>,
}

fn parse_offset_table<R: Read + Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    args: (u32,),
) -> BinResult<Vec<u64>> {
    let pos = reader.stream_position()?;
    let bytes = Vec::<u8>::read_options(
        reader,
        endian,
        binrw::VecArgs {
            count: args.0 as usize,
            inner: (),
        },
    )?;
    read_offset_table(&bytes).map_err(|e| binrw::Error::AssertFail {
        pos,
        message: e.to_string(),
    })
}

impl Bina {
    /// Create a container for `payload` and calculate the file size.
    ///
    /// Bytes starting at `string_table_offset` are the string table.
    /// Use the payload length if there are no strings.
    pub fn new(payload: Vec<u8>, string_table_offset: u32, pointers: Vec<u64>) -> Self {
        let offset_table_size = write_offset_table(&pointers).len();
        Self {
            file_size: (PAYLOAD_OFFSET as usize + payload.len() + offset_table_size) as u32,
            string_table_offset,
            payload,
            pointers,
        }
    }

    /// Detect the payload type from its magic.
    pub fn kind(&self) -> Option<FileKind> {
        match self.payload.get(..4) {
            Some(b"KSXP") => Some(FileKind::Skeleton),
            Some(b"NAXP") => Some(FileKind::Animation),
            _ => None,
        }
    }
}

impl BinWrite for Bina {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let offset_table = write_offset_table(&self.pointers);

        let data_size = DATA_HEADER_SIZE as usize + self.payload.len() + offset_table.len();
        let string_table_size = self
            .payload
            .len()
            .saturating_sub(self.string_table_offset as usize);

        BinaHeader {
            file_size: (data_size + 0x10) as u32,
            section_count: 1,
        }
        .write_options(writer, endian, ())?;

        DataHeader {
            data_size: data_size as u32,
            string_table_offset: self.string_table_offset,
            string_table_size: string_table_size as u32,
            offset_table_size: offset_table.len() as u32,
            additional_header_size: ADDITIONAL_HEADER_SIZE,
        }
        .write_options(writer, endian, ())?;

        writer.write_all(&self.payload)?;
        writer.write_all(&offset_table)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_write_bina() {
        let bytes = hex!(
            // header
            0x42494e41 3231304c 4c000000 01000000
            // data
            44415441 3c000000 08000000 00000000
            04000000 18000000 00000000 00000000
            00000000 00000000 00000000 00000000
            // payload
            0x4e415850 00020000
            // offset table
            42000000
        );

        let bina = Bina::from_bytes(bytes).unwrap();
        assert_eq!(
            Bina {
                file_size: 0x4c,
                string_table_offset: 8,
                payload: b"NAXP\x00\x02\x00\x00".to_vec(),
                pointers: vec![8],
            },
            bina
        );
        assert_eq!(Some(FileKind::Animation), bina.kind());
        assert_eq!(bytes.to_vec(), bina.to_bytes().unwrap());
    }

    #[test]
    fn new_bina_file_size() {
        let bina = Bina::new(b"KSXP\x00\x02\x00\x00".to_vec(), 8, vec![8, 0x28, 0x48]);
        assert_eq!(0x40 + 8 + 4, bina.file_size);
        assert_eq!(Some(FileKind::Skeleton), bina.kind());

        let bytes = bina.to_bytes().unwrap();
        assert_eq!(bina.file_size as usize, bytes.len());
        assert_eq!(bina, Bina::from_bytes(&bytes).unwrap());
    }

    #[test]
    fn read_bina_invalid_magic() {
        let bytes = hex!(
            0x42494e41 3231304c 40000000 01000000
            44415441 30000000 00000000 00000000
            00000000 18000000 00000000 00000000
            00000000 00000000 00000000 00000000
        );
        // Big endian files are not supported.
        let mut bytes = bytes.to_vec();
        bytes[7] = b'B';
        assert!(Bina::from_bytes(&bytes).is_err());
    }

    #[test]
    fn unknown_kind() {
        let bina = Bina::new(b"ABCD".to_vec(), 4, Vec::new());
        assert_eq!(None, bina.kind());
    }
}
