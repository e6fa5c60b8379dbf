//! # pxd_model
//! pxd_model provides high level data access for PXD skeletons and animations.
//!
//! Stored transforms use a convention where parent scale does not move child bones.
//! [bone_space] converts between stored local transforms and global transforms.
//! [Pose] converts global transforms to the standard convention used by most 3D applications.
//!
//! # Getting Started
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pxd_model::{DecodeOptions, Orientation, load_animation, load_skeleton};
//! # struct Compressor;
//! # impl pxd_lib::tracks::TrackCompressor for Compressor {
//! #     fn compress(&self, _: &[u8]) -> Vec<u8> { Vec::new() }
//! #     fn decompress(&self, _: &[u8]) -> Vec<u8> { Vec::new() }
//! # }
//!
//! let skeleton = load_skeleton("chr_sonic.skl.pxd", Orientation::YxBones)?;
//! let animation = load_animation("sn_idle_loop.anm.pxd", &Compressor)?;
//!
//! let options = DecodeOptions {
//!     orientation: Orientation::YxBones,
//!     pad_loop: true,
//! };
//! for pose in animation.pose_frames(&skeleton, &options)? {
//!     println!("{:?}", pose.bones.keys().collect::<Vec<_>>());
//! }
//! # Ok(())
//! # }
//! ```
use std::path::Path;

use pxd_lib::{
    bina::{Bina, FileKind},
    error::ReadFileError,
    ksxp::Ksxp,
    naxp::Naxp,
    outanim::OutAnim,
    tracks::TrackCompressor,
};

pub use animation::{
    AllFrames, Animation, Channel, DecodeOptions, EncodeOptions, KeyPredicate,
    padded_frame_count, padded_frame_index,
};
pub use orientation::Orientation;
pub use pose::{BonePose, Pose};
pub use skeleton::{Bone, BoneLengthOptions, LeafLength, Skeleton};
pub use transform::Transform;

pub mod animation;
pub mod bone_space;
pub mod error;
pub mod orientation;
pub mod pose;
pub mod skeleton;
mod transform;

use error::{LoadAnimationError, LoadSkeletonError, SaveAnimationError};

/// Load a skeleton from a `.skl.pxd` file.
pub fn load_skeleton<P: AsRef<Path>>(
    path: P,
    orientation: Orientation,
) -> Result<Skeleton, LoadSkeletonError> {
    let bina = read_bina(path.as_ref())?;
    match bina.kind() {
        Some(FileKind::Skeleton) => {
            let ksxp = Ksxp::from_bina(&bina)?;
            Ok(Skeleton::from_ksxp(&ksxp, orientation))
        }
        Some(kind) => Err(LoadSkeletonError::UnexpectedKind(kind)),
        None => Err(LoadSkeletonError::UnknownKind),
    }
}

/// Load an animation from a `.anm.pxd` or legacy `.outanim` file.
///
/// The `compressor` is only used for compressed tracks.
pub fn load_animation<P: AsRef<Path>, C: TrackCompressor + ?Sized>(
    path: P,
    compressor: &C,
) -> Result<Animation, LoadAnimationError> {
    let path = path.as_ref();
    if is_outanim(path) {
        let outanim = OutAnim::from_file(path).map_err(|e| read_error(path, e))?;
        return Ok(Animation::from_outanim(&outanim));
    }

    let bina = read_bina(path)?;
    match bina.kind() {
        Some(FileKind::Animation) => {
            let naxp = Naxp::from_bina(&bina)?;
            Animation::from_naxp(&naxp, compressor)
        }
        Some(kind) => Err(LoadAnimationError::UnexpectedKind(kind)),
        None => Err(LoadAnimationError::UnknownKind),
    }
}

/// Save `animation` with compressed tracks.
pub fn save_animation_compressed<P: AsRef<Path>, C: TrackCompressor + ?Sized>(
    path: P,
    animation: &Animation,
    compressor: &C,
) -> Result<(), SaveAnimationError> {
    let naxp = animation.to_naxp_compressed(compressor)?;
    std::fs::write(path, naxp.to_bina()?.to_bytes()?)?;
    Ok(())
}

/// Save `animation` with sparse tracks using `predicate` to select keys.
pub fn save_animation_sparse<P: AsRef<Path>, K: KeyPredicate + ?Sized>(
    path: P,
    animation: &Animation,
    predicate: &K,
) -> Result<(), SaveAnimationError> {
    let naxp = animation.to_naxp_sparse(predicate);
    std::fs::write(path, naxp.to_bina()?.to_bytes()?)?;
    Ok(())
}

/// Save `animation` as a legacy `.outanim` file.
pub fn save_outanim<P: AsRef<Path>>(
    path: P,
    animation: &Animation,
) -> Result<(), SaveAnimationError> {
    std::fs::write(path, animation.to_outanim().to_bytes()?)?;
    Ok(())
}

/// Returns `true` if `path` uses the legacy `.outanim` extension.
pub fn is_outanim(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("outanim"))
}

fn read_bina(path: &Path) -> Result<Bina, ReadFileError> {
    Bina::from_file(path).map_err(|e| read_error(path, e))
}

fn read_error(path: &Path, source: binrw::Error) -> ReadFileError {
    ReadFileError {
        path: path.to_owned(),
        source,
    }
}
