//! Animations decoded to per frame samples for each track.
//!
//! Compressed and sparse [Naxp] files as well as legacy [OutAnim] files
//! all decode to the same [Animation].
//! Use [Animation::global_transforms] or [Animation::pose_frames] to apply the animation to a [Skeleton].
use log::{error, warn};
use pxd_lib::{
    error::{CompressionError, DecompressTracksError},
    naxp::{COMPRESSED_FLAG, KeyChannel, Naxp, SparseTrack, TrackData},
    outanim::OutAnim,
    tracks::{self, TrackBuffer, TrackCompressor, TrackSample},
};

use crate::{
    BoneLengthOptions, Orientation, Pose, Skeleton, Transform,
    bone_space::global_transforms_ordered,
    error::{LoadAnimationError, SkeletonError},
    orientation::{decode_root_motion, encode_root_motion},
};

/// The maximum number of frames for sparse tracks.
pub const MAX_SPARSE_FRAMES: usize = u16::MAX as usize + 1;

#[derive(Debug, PartialEq, Clone)]
pub struct Animation {
    pub frame_rate: f32,
    pub additive: bool,
    /// The flag from the file.
    /// This is preserved when writing sparse tracks.
    pub compression_flag: u8,
    /// The samples for each frame with one sample for each track.
    /// Tracks use the same ordering as the bones in the [Skeleton].
    pub frames: Vec<Vec<TrackSample>>,
    /// The transform of the entire skeleton for each frame.
    pub root_motion: Option<Vec<TrackSample>>,
}

/// Settings for converting samples to transforms.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub orientation: Orientation,
    /// Repeat the animation three times for interpolating across the loop boundary.
    /// See [padded_frame_count].
    pub pad_loop: bool,
}

/// Settings for converting transforms to samples.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct EncodeOptions {
    pub orientation: Orientation,
    pub frame_rate: f32,
    pub additive: bool,
    pub bone_lengths: BoneLengthOptions,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Native,
            frame_rate: 30.0,
            additive: false,
            bone_lengths: BoneLengthOptions::default(),
        }
    }
}

/// The transform component for a [KeyChannel].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Channel {
    Translation,
    Rotation,
    Scale,
}

/// Determines which frames to store as keys when writing sparse tracks.
///
/// Frames without keys use the value of the previous key when decoding.
/// This can be implemented for closures like
/// `|channel, previous, current| previous != Some(current)`.
pub trait KeyPredicate {
    /// Returns `true` if `current` should be stored as a key.
    /// The `previous` value is the most recent key for this channel or `None` for the first frame.
    fn is_key(&self, channel: Channel, previous: Option<[f32; 4]>, current: [f32; 4]) -> bool;
}

impl<F> KeyPredicate for F
where
    F: Fn(Channel, Option<[f32; 4]>, [f32; 4]) -> bool,
{
    fn is_key(&self, channel: Channel, previous: Option<[f32; 4]>, current: [f32; 4]) -> bool {
        self(channel, previous, current)
    }
}

/// Store every frame as a key.
#[derive(Debug, Clone, Copy)]
pub struct AllFrames;

impl KeyPredicate for AllFrames {
    fn is_key(&self, _: Channel, _: Option<[f32; 4]>, _: [f32; 4]) -> bool {
        true
    }
}

impl Animation {
    pub fn from_naxp<C: TrackCompressor + ?Sized>(
        naxp: &Naxp,
        compressor: &C,
    ) -> Result<Self, LoadAnimationError> {
        let frame_count = naxp.frame_count as usize;

        // Only compressed tracks store their own frames.
        let uses_frame_count = !matches!(naxp.tracks, Some(TrackData::Compressed(_)))
            || matches!(naxp.root_motion, Some(TrackData::Sparse(_)));
        if uses_frame_count && frame_count > MAX_SPARSE_FRAMES {
            return Err(LoadAnimationError::FrameCount {
                frame_count: naxp.frame_count,
                max: MAX_SPARSE_FRAMES,
            });
        }

        let (frames, frame_rate) = match &naxp.tracks {
            Some(TrackData::Compressed(blob)) => {
                let buffer = TrackBuffer::decompress(blob, compressor)?;
                if buffer.frame_count != naxp.frame_count {
                    warn!(
                        "Compressed frame count {} does not match header frame count {}.",
                        buffer.frame_count, naxp.frame_count
                    );
                }
                if buffer.track_count as u64 != naxp.track_count {
                    warn!(
                        "Compressed track count {} does not match header track count {}.",
                        buffer.track_count, naxp.track_count
                    );
                }
                (buffer.frames(), buffer.frame_rate)
            }
            Some(TrackData::Sparse(sparse)) => (
                decode_sparse_tracks(sparse, frame_count),
                tracks::frame_rate(frame_count, naxp.duration),
            ),
            None => (
                vec![Vec::new(); frame_count],
                tracks::frame_rate(frame_count, naxp.duration),
            ),
        };

        let root_motion = match &naxp.root_motion {
            Some(TrackData::Compressed(blob)) => match decompress_root_motion(blob, compressor) {
                Ok(samples) => Some(samples),
                Err(e) => {
                    warn!("Ignoring root motion that failed to decompress: {e}");
                    None
                }
            },
            Some(TrackData::Sparse(sparse)) => {
                Some(first_track(decode_sparse_tracks(sparse, frame_count)))
            }
            None => None,
        };

        Ok(Self {
            frame_rate,
            additive: naxp.additive,
            compression_flag: naxp.compression_flag,
            frames,
            root_motion,
        })
    }

    /// Create an animation with compressed tracks.
    pub fn to_naxp_compressed<C: TrackCompressor + ?Sized>(
        &self,
        compressor: &C,
    ) -> Result<Naxp, CompressionError> {
        let buffer = TrackBuffer::from_frames(&self.frames, self.frame_rate);
        let compressed = buffer.compress(compressor)?;

        let root_motion = self
            .root_motion
            .as_ref()
            .map(|root| TrackBuffer::from_frames(&single_track(root), self.frame_rate))
            .map(|buffer| buffer.compress(compressor))
            .transpose()?;

        Ok(Naxp {
            additive: self.additive,
            compression_flag: COMPRESSED_FLAG,
            duration: buffer.duration,
            frame_count: buffer.frame_count,
            track_count: buffer.track_count as u64,
            tracks: Some(TrackData::Compressed(compressed)),
            root_motion: root_motion.map(TrackData::Compressed),
        })
    }

    /// Create an animation with sparse tracks using `predicate` to select keys.
    pub fn to_naxp_sparse<P: KeyPredicate + ?Sized>(&self, predicate: &P) -> Naxp {
        let compression_flag = if self.compression_flag == COMPRESSED_FLAG {
            0
        } else {
            self.compression_flag
        };

        Naxp {
            additive: self.additive,
            compression_flag,
            duration: tracks::duration(self.frames.len(), self.frame_rate),
            frame_count: self.frames.len() as u32,
            track_count: self.track_count() as u64,
            tracks: Some(TrackData::Sparse(encode_sparse_tracks(
                &self.frames,
                predicate,
            ))),
            root_motion: self
                .root_motion
                .as_ref()
                .map(|root| TrackData::Sparse(encode_sparse_tracks(&single_track(root), predicate))),
        }
    }

    pub fn from_outanim(outanim: &OutAnim) -> Self {
        Self {
            frame_rate: outanim_frame_rate(outanim.frame_count, outanim.duration),
            additive: false,
            compression_flag: 0,
            frames: outanim.frames(),
            root_motion: None,
        }
    }

    /// Root motion is not supported and will be ignored.
    pub fn to_outanim(&self) -> OutAnim {
        if self.root_motion.is_some() {
            warn!("Root motion is not supported for outanim files and will be ignored.");
        }

        let buffer = TrackBuffer::from_frames(&self.frames, self.frame_rate);
        OutAnim {
            duration: outanim_duration(buffer.frame_count, self.frame_rate),
            frame_count: buffer.frame_count,
            bone_count: buffer.track_count,
            samples: buffer.samples,
        }
    }

    /// Create an animation from the pose of `skeleton` for each frame.
    ///
    /// Poses are converted to track samples ordered by the bones in `skeleton`.
    /// The optional `root_motion` should have one transform per pose.
    pub fn from_poses(
        skeleton: &Skeleton,
        poses: &[Pose],
        root_motion: Option<&[Transform]>,
        options: &EncodeOptions,
    ) -> Result<Self, SkeletonError> {
        let order = skeleton.hierarchy_order()?;
        let lengths = skeleton.bone_lengths(&options.bone_lengths)?;

        let frames = poses
            .iter()
            .map(|pose| {
                pose.local_transforms(skeleton, &order)
                    .into_iter()
                    .zip(&skeleton.bones)
                    .zip(&lengths)
                    .map(|((transform, bone), length)| {
                        options.orientation.encode_sample(
                            transform,
                            bone.parent_index.is_none(),
                            *length,
                        )
                    })
                    .collect()
            })
            .collect();

        let root_motion = root_motion.map(|transforms| {
            if transforms.len() != poses.len() {
                warn!(
                    "Root motion frame count {} does not match pose count {}.",
                    transforms.len(),
                    poses.len()
                );
            }
            transforms.iter().map(|t| encode_root_motion(*t)).collect()
        });

        Ok(Self {
            frame_rate: options.frame_rate,
            additive: options.additive,
            compression_flag: 0,
            frames,
            root_motion,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The number of tracks in the frame with the most tracks.
    pub fn track_count(&self) -> usize {
        self.frames.iter().map(Vec::len).max().unwrap_or_default()
    }

    /// The global transform for each bone in `skeleton` for each frame.
    ///
    /// Bones without a track use [Transform::IDENTITY] as the local transform.
    /// Tracks without a bone are ignored.
    pub fn global_transforms(
        &self,
        skeleton: &Skeleton,
        options: &DecodeOptions,
    ) -> Result<Vec<Vec<Transform>>, SkeletonError> {
        let order = skeleton.hierarchy_order()?;

        let track_count = self.track_count();
        if track_count != skeleton.bones.len() {
            warn!(
                "Track count {} does not match bone count {}.",
                track_count,
                skeleton.bones.len()
            );
        }

        Ok(self
            .frame_indices(options.pad_loop)
            .map(|frame| {
                let locals: Vec<_> = skeleton
                    .bones
                    .iter()
                    .enumerate()
                    .map(|(i, bone)| {
                        self.frames[frame]
                            .get(i)
                            .map(|s| options.orientation.decode_sample(s, bone.parent_index.is_none()))
                            .unwrap_or(Transform::IDENTITY)
                    })
                    .collect();
                global_transforms_ordered(skeleton, &order, &locals)
            })
            .collect())
    }

    /// The [Pose] of `skeleton` for each frame.
    pub fn pose_frames(
        &self,
        skeleton: &Skeleton,
        options: &DecodeOptions,
    ) -> Result<Vec<Pose>, SkeletonError> {
        Ok(self
            .global_transforms(skeleton, options)?
            .iter()
            .map(|globals| Pose::from_global_transforms(skeleton, globals))
            .collect())
    }

    /// The transform of the entire skeleton for each frame or `None` if there is no root motion.
    pub fn root_motion_transforms(&self, options: &DecodeOptions) -> Option<Vec<Transform>> {
        let root_motion = self.root_motion.as_ref()?;
        Some(
            self.frame_indices(options.pad_loop)
                .map(|frame| {
                    root_motion
                        .get(frame)
                        .map(decode_root_motion)
                        .unwrap_or(Transform::IDENTITY)
                })
                .collect(),
        )
    }

    fn frame_indices(&self, pad_loop: bool) -> impl Iterator<Item = usize> + '_ {
        let frame_count = self.frames.len();
        let count = if pad_loop {
            padded_frame_count(frame_count)
        } else {
            frame_count
        };
        (0..count).map(move |i| {
            if pad_loop {
                padded_frame_index(i, frame_count)
            } else {
                i
            }
        })
    }
}

/// The number of frames when repeating `frame_count` frames three times.
///
/// The last frame of the animation is assumed to match the first frame.
/// This leaves `frame_count - 1` unique frames for each repetition and a final copy of the first frame.
pub fn padded_frame_count(frame_count: usize) -> usize {
    match frame_count {
        0 => 0,
        1 => 1,
        n => 3 * (n - 1) + 1,
    }
}

/// The unpadded frame for `frame` in the padded animation.
/// See [padded_frame_count].
pub fn padded_frame_index(frame: usize, frame_count: usize) -> usize {
    if frame_count <= 1 || frame + 1 == padded_frame_count(frame_count) {
        0
    } else {
        frame % (frame_count - 1)
    }
}

/// Reconstruct every frame for each track in `tracks`.
///
/// Frames before the first key use the first key.
/// Frames after a key use that key until the next key.
/// Channels without keys use the identity transform.
pub fn decode_sparse_tracks(tracks: &[SparseTrack], frame_count: usize) -> Vec<Vec<TrackSample>> {
    let mut frames = vec![vec![TrackSample::IDENTITY; tracks.len()]; frame_count];

    for (i, track) in tracks.iter().enumerate() {
        let translations = channel_values(&track.translation, frame_count, [0.0; 4]);
        let rotations = channel_values(&track.rotation, frame_count, [0.0, 0.0, 0.0, 1.0]);
        let scales = channel_values(&track.scale, frame_count, [1.0, 1.0, 1.0, 0.0]);

        for (frame, ((t, r), s)) in frames
            .iter_mut()
            .zip(translations.iter().zip(&rotations).zip(&scales))
        {
            frame[i].translation = [t[0], t[1], t[2]];
            frame[i].rotation = *r;
            frame[i].scale = [s[0], s[1], s[2]];
        }
    }

    frames
}

/// Select keys for each track in `frames` using `predicate`.
///
/// Frames past the largest supported key frame are not stored.
pub fn encode_sparse_tracks<P: KeyPredicate + ?Sized>(
    frames: &[Vec<TrackSample>],
    predicate: &P,
) -> Vec<SparseTrack> {
    if frames.len() > MAX_SPARSE_FRAMES {
        error!(
            "Frame count {} exceeds the maximum of {MAX_SPARSE_FRAMES}. Discarding {} frames.",
            frames.len(),
            frames.len() - MAX_SPARSE_FRAMES
        );
    }
    let frames = &frames[..frames.len().min(MAX_SPARSE_FRAMES)];

    let track_count = frames.iter().map(Vec::len).max().unwrap_or_default();
    (0..track_count)
        .map(|i| {
            let sample = |frame: &[TrackSample]| {
                frame.get(i).copied().unwrap_or(TrackSample::IDENTITY)
            };
            SparseTrack {
                translation: select_keys(frames, Channel::Translation, predicate, |f| {
                    let [x, y, z] = sample(f).translation;
                    [x, y, z, 0.0]
                }),
                rotation: select_keys(frames, Channel::Rotation, predicate, |f| {
                    sample(f).rotation
                }),
                scale: select_keys(frames, Channel::Scale, predicate, |f| {
                    let [x, y, z] = sample(f).scale;
                    [x, y, z, 0.0]
                }),
            }
        })
        .collect()
}

fn select_keys<P: KeyPredicate + ?Sized>(
    frames: &[Vec<TrackSample>],
    channel: Channel,
    predicate: &P,
    value: impl Fn(&[TrackSample]) -> [f32; 4],
) -> KeyChannel {
    let mut keys = KeyChannel::default();
    let mut previous = None;
    for (frame, sample) in frames.iter().enumerate() {
        let current = value(sample);
        if predicate.is_key(channel, previous, current) {
            keys.frames.push(frame as u16);
            keys.values.push(current);
            previous = Some(current);
        }
    }
    keys
}

fn channel_values(channel: &KeyChannel, frame_count: usize, default: [f32; 4]) -> Vec<[f32; 4]> {
    if channel.frames.len() != channel.values.len() {
        warn!(
            "Key frame count {} does not match key value count {}.",
            channel.frames.len(),
            channel.values.len()
        );
    }

    let mut keys: Vec<_> = channel
        .frames
        .iter()
        .map(|f| *f as usize)
        .zip(channel.values.iter().copied())
        .filter(|(frame, _)| {
            if *frame >= frame_count {
                warn!("Ignoring key at frame {frame} for frame count {frame_count}.");
            }
            *frame < frame_count
        })
        .collect();
    // Stable sorting keeps the last key for duplicate frames.
    keys.sort_by_key(|(frame, _)| *frame);

    let Some((_, first)) = keys.first() else {
        return vec![default; frame_count];
    };

    let mut values = vec![*first; frame_count];
    for (k, (start, value)) in keys.iter().enumerate() {
        let end = keys.get(k + 1).map(|(next, _)| *next).unwrap_or(frame_count);
        values[*start..end].fill(*value);
    }
    values
}

fn decompress_root_motion<C: TrackCompressor + ?Sized>(
    blob: &[u8],
    compressor: &C,
) -> Result<Vec<TrackSample>, DecompressTracksError> {
    let buffer = TrackBuffer::decompress(blob, compressor)?;
    Ok(first_track(buffer.frames()))
}

fn first_track(frames: Vec<Vec<TrackSample>>) -> Vec<TrackSample> {
    frames
        .into_iter()
        .map(|f| f.first().copied().unwrap_or(TrackSample::IDENTITY))
        .collect()
}

fn single_track(samples: &[TrackSample]) -> Vec<Vec<TrackSample>> {
    samples.iter().map(|s| vec![*s]).collect()
}

// Legacy files measure duration as the frame count divided by the frame rate.
fn outanim_frame_rate(frame_count: u32, duration: f32) -> f32 {
    if duration != 0.0 {
        frame_count as f32 / duration
    } else {
        30.0
    }
}

fn outanim_duration(frame_count: u32, frame_rate: f32) -> f32 {
    if frame_rate > 0.0 {
        frame_count as f32 / frame_rate
    } else {
        0.0
    }
}
