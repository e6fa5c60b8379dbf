//! Fixed stride track samples used by compressed and legacy animations.
//!
//! Compressed animations store a [TrackBuffer] as an opaque blob
//! produced by an external compression library.
//! The compression itself is not implemented here.
//! See [TrackCompressor] for converting between the blob and the samples.
use std::io::Cursor;

use binrw::{BinRead, BinReaderExt, BinWrite};
use log::warn;

use crate::error::{CompressionError, DecompressTracksError};

/// The size in bytes of the [TrackBuffer] header.
pub const TRACK_HEADER_SIZE: usize = 16;

/// The transform for a single track at a single frame.
#[derive(Debug, BinRead, BinWrite, PartialEq, Clone, Copy)]
pub struct TrackSample {
    /// The quaternion as xyzw.
    pub rotation: [f32; 4],
    pub translation: [f32; 3],
    /// The bone's length after applying scale.
    /// This is informational and not needed to reconstruct the pose.
    pub bone_length: f32,
    /// A scale of exactly zero is treated as a unit scale.
    pub scale: [f32; 3],
    /// Usually 1.0.
    pub reserved: f32,
}

impl TrackSample {
    pub const IDENTITY: Self = Self {
        rotation: [0.0, 0.0, 0.0, 1.0],
        translation: [0.0; 3],
        bone_length: 0.0,
        scale: [1.0; 3],
        reserved: 1.0,
    };
}

impl Default for TrackSample {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The decompressed track payload.
#[derive(Debug, BinRead, BinWrite, PartialEq, Clone)]
pub struct TrackBuffer {
    /// The length in seconds.
    pub duration: f32,
    pub frame_rate: f32,
    pub frame_count: u32,
    /// The number of bones or 1 for root motion.
    pub track_count: u32,
    /// Samples for all tracks in the first frame followed by all tracks in the next frame and so on.
    #[br(count = frame_count as usize * track_count as usize)]
    pub samples: Vec<TrackSample>,
}

/// An external library for compressing the fixed stride [TrackBuffer] bytes.
///
/// Both methods return an empty [Vec] to indicate failure.
/// The compressed output starts with its own size in bytes as a u32.
pub trait TrackCompressor {
    fn compress(&self, decompressed: &[u8]) -> Vec<u8>;

    fn decompress(&self, compressed: &[u8]) -> Vec<u8>;
}

impl TrackBuffer {
    /// Create a buffer from frame major `frames` with one sample for each track.
    ///
    /// Frames with fewer samples are padded with [TrackSample::IDENTITY].
    pub fn from_frames(frames: &[Vec<TrackSample>], frame_rate: f32) -> Self {
        let track_count = frames.iter().map(Vec::len).max().unwrap_or_default();
        let samples = frames
            .iter()
            .flat_map(|frame| {
                (0..track_count).map(|i| frame.get(i).copied().unwrap_or(TrackSample::IDENTITY))
            })
            .collect();

        Self {
            duration: duration(frames.len(), frame_rate),
            frame_rate,
            frame_count: frames.len() as u32,
            track_count: track_count as u32,
            samples,
        }
    }

    /// The samples for each frame.
    pub fn frames(&self) -> Vec<Vec<TrackSample>> {
        if self.track_count == 0 {
            return vec![Vec::new(); self.frame_count as usize];
        }
        self.samples
            .chunks(self.track_count as usize)
            .map(|c| c.to_vec())
            .collect()
    }

    pub fn compress<C: TrackCompressor + ?Sized>(
        &self,
        compressor: &C,
    ) -> Result<Vec<u8>, CompressionError> {
        let mut writer = Cursor::new(Vec::new());
        self.write_le(&mut writer)?;
        let decompressed = writer.into_inner();

        let compressed = compressor.compress(&decompressed);
        if compressed.is_empty() {
            Err(CompressionError::EmptyOutput {
                input_size: decompressed.len(),
            })
        } else {
            Ok(compressed)
        }
    }

    pub fn decompress<C: TrackCompressor + ?Sized>(
        compressed: &[u8],
        compressor: &C,
    ) -> Result<Self, DecompressTracksError> {
        let decompressed = compressor.decompress(compressed);
        if decompressed.is_empty() {
            return Err(DecompressTracksError::EmptyOutput {
                input_size: compressed.len(),
            });
        }
        if decompressed.len() < TRACK_HEADER_SIZE {
            return Err(DecompressTracksError::Truncated {
                size: decompressed.len(),
            });
        }

        let buffer: Self = Cursor::new(&decompressed).read_le()?;
        let expected_duration = duration(buffer.frame_count as usize, buffer.frame_rate);
        if (buffer.duration - expected_duration).abs() > 0.001 {
            warn!(
                "Track duration {} does not match {} frames at {} fps.",
                buffer.duration, buffer.frame_count, buffer.frame_rate
            );
        }
        Ok(buffer)
    }
}

/// The length in seconds of `frame_count` frames.
pub fn duration(frame_count: usize, frame_rate: f32) -> f32 {
    if frame_rate > 0.0 {
        frame_count.saturating_sub(1) as f32 / frame_rate
    } else {
        0.0
    }
}

/// The frames per second for `frame_count` frames lasting `duration` seconds.
///
/// Files without a duration default to 30 fps.
pub fn frame_rate(frame_count: usize, duration: f32) -> f32 {
    if duration != 0.0 {
        frame_count.saturating_sub(1) as f32 / duration
    } else {
        30.0
    }
}
