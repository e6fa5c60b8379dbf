use pxd_lib::{
    bina::FileKind,
    error::{CompressionError, DecompressTracksError, ReadFileError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("bone {index} has parent {parent} but the skeleton only has {count} bones")]
    ParentOutOfRange {
        index: usize,
        parent: usize,
        count: usize,
    },

    #[error("bone {index} is part of a cycle in the bone hierarchy")]
    Cycle { index: usize },

    #[error("skeleton has {count} bones but parent indices only support {max} bones")]
    TooManyBones { count: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum LoadSkeletonError {
    #[error("error reading skeleton file")]
    Read(#[from] ReadFileError),

    #[error("expected a skeleton but found {0}")]
    UnexpectedKind(FileKind),

    #[error("unrecognized payload magic")]
    UnknownKind,

    #[error("error reading skeleton data")]
    Ksxp(#[from] binrw::Error),
}

#[derive(Debug, Error)]
pub enum LoadAnimationError {
    #[error("error reading animation file")]
    Read(#[from] ReadFileError),

    #[error("expected an animation but found {0}")]
    UnexpectedKind(FileKind),

    #[error("unrecognized payload magic")]
    UnknownKind,

    #[error("error reading animation data")]
    Naxp(#[from] binrw::Error),

    #[error("error decompressing tracks")]
    Decompress(#[from] DecompressTracksError),

    #[error("frame count {frame_count} exceeds the maximum of {max} frames for sparse tracks")]
    FrameCount { frame_count: u32, max: usize },
}

#[derive(Debug, Error)]
pub enum SaveAnimationError {
    #[error("error compressing tracks")]
    Compression(#[from] CompressionError),

    #[error("error writing animation data")]
    Binrw(#[from] binrw::Error),

    #[error("error writing animation file")]
    Io(#[from] std::io::Error),
}
