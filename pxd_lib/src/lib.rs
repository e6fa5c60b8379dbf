//! A library for reading and writing PXD animation and skeleton files.
//!
//! Every file is a [Bina](bina::Bina) container holding a single payload.
//! Skeletons store a [Ksxp](ksxp::Ksxp) payload and animations store a [Naxp](naxp::Naxp) payload.
//! The legacy `.outanim` format is a raw [OutAnim](outanim::OutAnim) without any container.
//!
//! # Getting Started
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pxd_lib::{bina::{Bina, FileKind}, ksxp::Ksxp};
//!
//! let bina = Bina::from_file("chr_sonic.skl.pxd")?;
//! if bina.kind() == Some(FileKind::Skeleton) {
//!     let ksxp = Ksxp::from_bina(&bina)?;
//!     println!("{ksxp:#?}");
//!
//!     // Save to disk after making any changes.
//!     ksxp.to_bina()?.write_to_file("out.skl.pxd")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! Each format is a set of Rust types matching the structures in the binary file.
//! Reading uses binrw derives on the types with pointers followed relative to the payload start.
//! Writing lays out data with a [PayloadWriter](write::PayloadWriter)
//! that records every pointer for the container's offset table.
//!
//! No coordinate conversion or compression happens here.
//! Track payloads are compressed and decompressed in a separate step using a
//! [TrackCompressor](tracks::TrackCompressor).
use std::{
    error::Error,
    io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
};

use binrw::{BinRead, BinReaderExt, BinResult, BinWrite, NullString, VecArgs};
use log::{trace, warn};

pub mod bina;
pub mod error;
pub mod ksxp;
pub mod naxp;
pub mod offset_table;
pub mod outanim;
pub mod tracks;
pub mod write;

// All payload pointers are u64 and relative to the payload start.
// Readers for payloads should start at the payload to simplify offsets.
fn parse_ptr64<T, R>(reader: &mut R, endian: binrw::Endian, _args: ()) -> BinResult<T>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    // Reading data at the current position produces confusing errors.
    let pos = reader.stream_position()?;
    let offset = u64::read_options(reader, endian, ())?;
    if offset == 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: "unexpected null offset".to_string(),
        });
    }

    parse_ptr(offset, reader, endian)
}

fn parse_ptr<T, R>(offset: u64, reader: &mut R, endian: binrw::Endian) -> BinResult<T>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let saved_pos = reader.stream_position()?;

    reader.seek(SeekFrom::Start(offset))?;
    trace!(
        "{}: {:?}",
        std::any::type_name::<T>(),
        reader.stream_position()?
    );
    let value = T::read_options(reader, endian, ())?;
    reader.seek(SeekFrom::Start(saved_pos))?;

    Ok(value)
}

fn parse_vec<T, R>(
    reader: &mut R,
    endian: binrw::Endian,
    offset: u64,
    count: usize,
) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let saved_pos = reader.stream_position()?;

    reader.seek(SeekFrom::Start(offset))?;
    trace!(
        "{}: {:?}",
        std::any::type_name::<Vec<T>>(),
        reader.stream_position()?
    );

    let values = Vec::<T>::read_options(reader, endian, VecArgs { count, inner: () })?;

    reader.seek(SeekFrom::Start(saved_pos))?;

    Ok(values)
}

/// Parse a table descriptor of offset, count, capacity, and a reserved 0.
fn parse_offset64_count64<T, R>(
    reader: &mut R,
    endian: binrw::Endian,
    _args: (),
) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let pos = reader.stream_position()?;
    let offset = u64::read_options(reader, endian, ())?;
    let count = u64::read_options(reader, endian, ())?;
    let capacity = u64::read_options(reader, endian, ())?;
    let _reserved = u64::read_options(reader, endian, ())?;

    if offset == 0 && count != 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("unexpected null offset for count {count}"),
        });
    }

    if capacity != count {
        warn!("Table at {pos} has count {count} but capacity {capacity}.");
    }

    let count = usize::try_from(count).map_err(|_| binrw::Error::AssertFail {
        pos,
        message: format!("table count {count} does not fit in memory"),
    })?;
    parse_vec(reader, endian, offset, count)
}

fn parse_string_ptr64<R: Read + Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    args: (),
) -> BinResult<String> {
    let value: NullString = parse_ptr64(reader, endian, args)?;
    match String::from_utf8(value.0) {
        Ok(name) => Ok(name),
        Err(e) => {
            let name = String::from_utf8_lossy(e.as_bytes()).into_owned();
            warn!("Replaced invalid UTF-8 in name {name:?}.");
            Ok(name)
        }
    }
}

macro_rules! file_write_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<(), Box<dyn Error>> {
                    self.write_le(writer).map_err(Into::into)
                }

                /// Write to `path` using a buffered writer for better performance.
                pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
                    let mut writer = BufWriter::new(std::fs::File::create(path)?);
                    self.write_le(&mut writer)?;
                    writer.flush()?;
                    Ok(())
                }

                /// Write to a new in memory buffer.
                pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
                    let mut writer = Cursor::new(Vec::new());
                    self.write_le(&mut writer)?;
                    Ok(writer.into_inner())
                }
            }
        )*
    };
}

file_write_impl!(bina::Bina, outanim::OutAnim);

macro_rules! file_read_impl {
    ($($type_name:path),*) => {
        $(
            impl $type_name {
                pub fn read<R: Read + Seek>(reader: &mut R) -> binrw::BinResult<Self> {
                    reader.read_le().map_err(Into::into)
                }

                /// Read from `path` using a fully buffered reader for performance.
                pub fn from_file<P: AsRef<Path>>(path: P) -> binrw::BinResult<Self> {
                    let mut reader = Cursor::new(std::fs::read(path)?);
                    reader.read_le().map_err(Into::into)
                }

                /// Read from `bytes` using a fully buffered reader for performance.
                pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> binrw::BinResult<Self> {
                    Self::read(&mut Cursor::new(bytes))
                }
            }
        )*
    };
}

file_read_impl!(bina::Bina, outanim::OutAnim);

#[cfg(test)]
mod tests {
    use super::*;

    use binrw::binread;
    use hexlit::hex;

    #[binread]
    #[derive(Debug, PartialEq)]
    struct Table {
        #[br(parse_with = parse_offset64_count64)]
        values: Vec<u16>,
    }

    #[test]
    fn read_table_descriptor() {
        let bytes = hex!(
            20000000 00000000
            02000000 00000000
            02000000 00000000
            00000000 00000000
            01000200
        );
        let table: Table = Cursor::new(&bytes).read_le().unwrap();
        assert_eq!(vec![1, 2], table.values);
    }

    #[test]
    fn read_table_descriptor_null_offset() {
        let bytes = hex!(
            00000000 00000000
            01000000 00000000
            01000000 00000000
            00000000 00000000
        );
        let result: BinResult<Table> = Cursor::new(&bytes).read_le();
        assert!(result.is_err());
    }

    #[test]
    fn read_table_descriptor_empty() {
        let bytes = [0u8; 32];
        let table: Table = Cursor::new(&bytes).read_le().unwrap();
        assert!(table.values.is_empty());
    }
}
