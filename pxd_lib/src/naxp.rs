//! Animations in `.anm.pxd` files.
//!
//! The track data is either a compressed blob or sparse keyframes
//! depending on the [compression_flag](struct.Naxp.html#structfield.compression_flag).
//! Root motion uses the same representation as the main tracks with a single track.
//!
//! # File Layout
//! | offset | field |
//! | --- | --- |
//! | 0x00 | magic and version |
//! | 0x08 | additive and compression flags |
//! | 0x10 | offset to the parameters at 0x18 |
//! | 0x18 | duration, frame count, and track count |
//! | 0x28 | offset to the main tracks |
//! | 0x30 | offset to the root motion or 0 |
//! | 0x40 | main tracks followed by root motion aligned to 16 |
use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::{binread, BinRead, BinReaderExt, BinResult};
use log::{trace, warn};

use crate::{
    bina::{Bina, PAYLOAD_OFFSET},
    parse_vec,
    write::PayloadWriter,
};

pub const VERSION: u32 = 512;

/// The [compression_flag](struct.Naxp.html#structfield.compression_flag) for compressed tracks.
pub const COMPRESSED_FLAG: u8 = 8;

const PARAMS_OFFSET: u64 = 0x18;

#[binread]
#[derive(Debug, PartialEq, Clone)]
#[br(magic(b"NAXP"), import(file_size: u32))]
pub struct Naxp {
    #[br(temp, assert(version == VERSION, "unsupported animation version {}", version))]
    version: u32,

    #[br(map = |x: u8| x != 0)]
    pub additive: bool,

    /// [COMPRESSED_FLAG] for compressed tracks.
    /// Other values use sparse tracks.
    #[br(pad_after = 6)]
    pub compression_flag: u8,

    #[br(temp, assert(params_offset == PARAMS_OFFSET, "unexpected params offset {}", params_offset))]
    params_offset: u64,

    /// The length in seconds.
    pub duration: f32,
    pub frame_count: u32,
    /// The number of bone tracks in [tracks](#structfield.tracks).
    pub track_count: u64,

    #[br(parse_with = parse_main_tracks, args(compression_flag, track_count))]
    pub tracks: Option<TrackData>,

    #[br(parse_with = parse_root_motion, args(compression_flag, file_size))]
    pub root_motion: Option<TrackData>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TrackData {
    /// A [TrackBuffer](crate::tracks::TrackBuffer) compressed by an external library.
    /// The first 4 bytes are the size of the blob.
    Compressed(Vec<u8>),
    Sparse(Vec<SparseTrack>),
}

/// Independent keyframes for each channel of a single track.
#[derive(Debug, BinRead, PartialEq, Clone, Default)]
pub struct SparseTrack {
    /// XYZ values with an unused fourth component.
    pub translation: KeyChannel,
    /// XYZW quaternion values.
    pub rotation: KeyChannel,
    /// XYZ values with an unused fourth component.
    pub scale: KeyChannel,
}

/// Keyframes for a single channel.
///
/// The [frames](#structfield.frames) and [values](#structfield.values) should have the same length.
#[binread]
#[derive(Debug, PartialEq, Clone, Default)]
pub struct KeyChannel {
    #[br(temp)]
    count: u64,

    #[br(parse_with = parse_keys, args(count))]
    pub frames: Vec<u16>,

    #[br(parse_with = parse_keys, args(count))]
    pub values: Vec<[f32; 4]>,
}

impl SparseTrack {
    pub fn channels(&self) -> [&KeyChannel; 3] {
        [&self.translation, &self.rotation, &self.scale]
    }
}

impl Naxp {
    /// Read the animation from the payload of `bina`.
    pub fn from_bina(bina: &Bina) -> BinResult<Self> {
        Cursor::new(&bina.payload).read_le_args((bina.file_size,))
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_flag == COMPRESSED_FLAG
    }

    /// Lay out the tracks and root motion in a new container.
    pub fn to_bina(&self) -> BinResult<Bina> {
        let mut writer = PayloadWriter::new();
        writer.write_bytes(b"NAXP")?;
        writer.write(&VERSION)?;
        writer.write(&u8::from(self.additive))?;
        writer.write(&self.compression_flag)?;
        writer.write_bytes(&[0u8; 6])?;

        let params = writer.offset_placeholder()?;
        params.set_here(&mut writer)?;
        writer.write(&self.duration)?;
        writer.write(&self.frame_count)?;
        writer.write(&self.track_count)?;

        let main = writer.offset_placeholder()?;
        let root = writer.offset_placeholder()?;
        writer.write(&0u64)?;

        if let Some(tracks) = &self.tracks {
            main.set_here(&mut writer)?;
            write_track_data(&mut writer, tracks)?;
        }

        if let Some(root_motion) = &self.root_motion {
            writer.pad_to(16)?;
            root.set_here(&mut writer)?;
            write_track_data(&mut writer, root_motion)?;
        }
        writer.pad_to(4)?;

        // There are no strings, so the string table is empty.
        let (payload, pointers) = writer.finish();
        let string_table_offset = payload.len() as u32;
        Ok(Bina::new(payload, string_table_offset, pointers))
    }
}

fn parse_main_tracks<R: Read + Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    args: (u8, u64),
) -> BinResult<Option<TrackData>> {
    let (compression_flag, track_count) = args;
    let offset = u64::read_options(reader, endian, ())?;
    if offset == 0 {
        return Ok(None);
    }
    parse_track_data(reader, endian, offset, compression_flag, track_count).map(Some)
}

fn parse_root_motion<R: Read + Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    args: (u8, u32),
) -> BinResult<Option<TrackData>> {
    let (compression_flag, file_size) = args;
    let offset = u64::read_options(reader, endian, ())?;
    if offset == 0 {
        return Ok(None);
    }

    // Some older tools wrote an offset past the end of the file without any root motion.
    let limit = (file_size as u64).saturating_sub(PAYLOAD_OFFSET);
    if offset + PAYLOAD_OFFSET > limit {
        warn!("Ignoring root motion offset {offset} for file size {file_size}.");
        return Ok(None);
    }

    parse_track_data(reader, endian, offset, compression_flag, 1).map(Some)
}

fn parse_track_data<R: Read + Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    offset: u64,
    compression_flag: u8,
    track_count: u64,
) -> BinResult<TrackData> {
    let saved_pos = reader.stream_position()?;

    reader.seek(SeekFrom::Start(offset))?;
    trace!("{}: {:?}", std::any::type_name::<TrackData>(), offset);

    let data = if compression_flag == COMPRESSED_FLAG {
        let size = u32::read_options(reader, endian, ())?;
        if size < 4 {
            return Err(binrw::Error::AssertFail {
                pos: offset,
                message: format!("compressed track size {size} is smaller than its header"),
            });
        }
        let blob = parse_vec(reader, endian, offset, size as usize)?;
        TrackData::Compressed(blob)
    } else {
        let count = usize::try_from(track_count).map_err(|_| binrw::Error::AssertFail {
            pos: offset,
            message: format!("track count {track_count} does not fit in memory"),
        })?;
        TrackData::Sparse(parse_vec(reader, endian, offset, count)?)
    };

    reader.seek(SeekFrom::Start(saved_pos))?;
    Ok(data)
}

// Channels without keys may have any offset.
fn parse_keys<T, R>(reader: &mut R, endian: binrw::Endian, args: (u64,)) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    let (count,) = args;
    let pos = reader.stream_position()?;
    let offset = u64::read_options(reader, endian, ())?;
    if count == 0 {
        return Ok(Vec::new());
    }
    if offset == 0 {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("unexpected null offset for {count} keys"),
        });
    }

    parse_vec(reader, endian, offset, count as usize)
}

fn write_track_data(writer: &mut PayloadWriter, data: &TrackData) -> BinResult<()> {
    match data {
        TrackData::Compressed(blob) => writer.write_bytes(blob),
        TrackData::Sparse(tracks) => write_sparse_tracks(writer, tracks),
    }
}

fn write_sparse_tracks(writer: &mut PayloadWriter, tracks: &[SparseTrack]) -> BinResult<()> {
    // Descriptors for every track come before any keys.
    let mut channels = Vec::new();
    for track in tracks {
        for channel in track.channels() {
            writer.write(&(channel.frames.len() as u64))?;
            let frames = writer.offset_placeholder()?;
            let values = writer.offset_placeholder()?;
            channels.push((channel, frames, values));
        }
    }

    for (channel, frames, values) in channels {
        // Empty channels keep null offsets.
        if channel.frames.is_empty() {
            continue;
        }

        frames.set_here(writer)?;
        for frame in &channel.frames {
            writer.write(frame)?;
        }
        writer.pad_to(16)?;

        values.set_here(writer)?;
        for value in &channel.values {
            writer.write(value)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;
    use pretty_assertions::assert_eq;

    const COMPRESSED: &[u8] = &hex!(
        // bina header
        0x42494e41 3231304c 8c000000 01000000
        // data header
        44415441 7c000000 48000000 00000000
        04000000 18000000 00000000 00000000
        00000000 00000000 00000000 00000000
        // naxp header
        0x4e415850 00020000 0008 000000000000
        18000000 00000000
        0000803f 1f000000 02000000 00000000
        40000000 00000000 00000000 00000000 00000000 00000000
        // main tracks
        08000000 01020304
        // offset table
        44460000
    );

    fn blob(size: usize) -> Vec<u8> {
        let mut blob = (size as u32).to_le_bytes().to_vec();
        blob.resize(size, 0xAB);
        blob
    }

    fn channel(keys: &[(u16, [f32; 4])]) -> KeyChannel {
        KeyChannel {
            frames: keys.iter().map(|(f, _)| *f).collect(),
            values: keys.iter().map(|(_, v)| *v).collect(),
        }
    }

    fn read_naxp(bytes: &[u8]) -> Naxp {
        Naxp::from_bina(&Bina::from_bytes(bytes).unwrap()).unwrap()
    }

    #[test]
    fn read_compressed() {
        assert_eq!(
            Naxp {
                additive: false,
                compression_flag: COMPRESSED_FLAG,
                duration: 1.0,
                frame_count: 31,
                track_count: 2,
                tracks: Some(TrackData::Compressed(hex!(08000000 01020304).to_vec())),
                root_motion: None
            },
            read_naxp(COMPRESSED)
        );
    }

    #[test]
    fn write_compressed() {
        let naxp = read_naxp(COMPRESSED);
        assert_eq!(COMPRESSED.to_vec(), naxp.to_bina().unwrap().to_bytes().unwrap());
    }

    #[test]
    fn read_stale_root_offset_past_end() {
        let mut bytes = COMPRESSED.to_vec();
        bytes[0x70] = 0x00;
        bytes[0x71] = 0x10;
        assert_eq!(None, read_naxp(&bytes).root_motion);
    }

    #[test]
    fn read_stale_root_offset_near_end() {
        // 0x48 + 0x40 is inside the last 0x40 bytes of the file.
        let mut bytes = COMPRESSED.to_vec();
        bytes[0x70] = 0x48;
        assert_eq!(None, read_naxp(&bytes).root_motion);
    }

    #[test]
    fn write_read_compressed_root_motion() {
        let naxp = Naxp {
            additive: true,
            compression_flag: COMPRESSED_FLAG,
            duration: 0.5,
            frame_count: 16,
            track_count: 3,
            tracks: Some(TrackData::Compressed(blob(8))),
            root_motion: Some(TrackData::Compressed(blob(0x40))),
        };
        let bina = naxp.to_bina().unwrap();

        // Main tracks at 0x40 and root motion aligned to 16.
        assert_eq!(0x90, bina.payload.len());
        assert_eq!(0x90, bina.string_table_offset);
        assert_eq!(vec![0x10, 0x28, 0x30], bina.pointers);
        assert_eq!(hex!(50000000 00000000), bina.payload[0x30..0x38]);

        let bytes = bina.to_bytes().unwrap();
        assert_eq!(hex!(44 46 42 00), bytes[bytes.len() - 4..]);
        assert_eq!(naxp, read_naxp(&bytes));
    }

    #[test]
    fn read_compressed_invalid_size() {
        let mut bytes = COMPRESSED.to_vec();
        bytes[0x80] = 0x02;
        assert!(Naxp::from_bina(&Bina::from_bytes(&bytes).unwrap()).is_err());
    }

    #[test]
    fn read_invalid_version() {
        let mut bytes = COMPRESSED.to_vec();
        bytes[0x45] = 0x01;
        bytes[0x46] = 0x00;
        assert!(Naxp::from_bina(&Bina::from_bytes(&bytes).unwrap()).is_err());
    }

    #[test]
    fn write_read_sparse() {
        let naxp = Naxp {
            additive: false,
            compression_flag: 0,
            duration: 2.0 / 30.0,
            frame_count: 3,
            track_count: 2,
            tracks: Some(TrackData::Sparse(vec![
                SparseTrack {
                    translation: channel(&[(0, [1.0, 2.0, 3.0, 0.0]), (2, [4.0, 5.0, 6.0, 0.0])]),
                    rotation: channel(&[(1, [0.0, 0.0, 0.0, 1.0])]),
                    scale: KeyChannel::default(),
                },
                SparseTrack::default(),
            ])),
            root_motion: Some(TrackData::Sparse(vec![SparseTrack {
                translation: KeyChannel::default(),
                rotation: KeyChannel::default(),
                scale: channel(&[(0, [2.0, 2.0, 2.0, 0.0])]),
            }])),
        };
        let bina = naxp.to_bina().unwrap();

        // Descriptors for 2 tracks are 0x40 to 0xD0.
        // Translation frames at 0xD0 and values at 0xE0.
        // Rotation frames at 0x100 and values at 0x110.
        // Root motion descriptors at 0x120 with scale frames at 0x168 and values at 0x170.
        assert_eq!(
            vec![0x10, 0x28, 0x30, 0x48, 0x50, 0x60, 0x68, 0x158, 0x160],
            bina.pointers
        );
        assert_eq!(0x180, bina.payload.len());

        let bytes = bina.to_bytes().unwrap();
        assert_eq!(naxp, read_naxp(&bytes));
    }

    #[test]
    fn read_sparse_null_keys() {
        let naxp = Naxp {
            additive: false,
            compression_flag: 0,
            duration: 0.0,
            frame_count: 1,
            track_count: 1,
            tracks: Some(TrackData::Sparse(vec![SparseTrack {
                translation: channel(&[(0, [1.0, 2.0, 3.0, 0.0])]),
                ..Default::default()
            }])),
            root_motion: None,
        };
        let mut bina = naxp.to_bina().unwrap();
        // Clear the translation frames offset.
        bina.payload[0x48..0x50].copy_from_slice(&[0u8; 8]);
        assert!(Naxp::from_bina(&bina).is_err());
    }
}
