//! Coordinate conversions between stored values and [Transform].
//!
//! Stored bones use X as the primary axis and Z as the secondary axis.
//! [Orientation::YxBones] reorients bones to use Y and X instead,
//! which matches applications that point bones along Y.
//! Root motion always uses its own Z up conversion regardless of the bone orientation.
use std::f32::consts::FRAC_1_SQRT_2;

use glam::{Quat, Vec3, vec3};
use pxd_lib::{ksxp::RestTransform, tracks::TrackSample};

use crate::Transform;

// Root bones realign their basis after remapping axes.
const YX_ROOT_DECODE: Quat = Quat::from_xyzw(-0.5, -0.5, -0.5, 0.5);
const YX_ROOT_ENCODE: Quat = Quat::from_xyzw(0.5, 0.5, 0.5, 0.5);

// Applied before the root motion rotation instead of after.
const ROOT_MOTION_DECODE: Quat = Quat::from_xyzw(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
const ROOT_MOTION_ENCODE: Quat = Quat::from_xyzw(-FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);

/// The axis convention for bone transforms.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Orientation {
    /// Values are used as stored.
    #[default]
    Native,
    /// Stored (x, y, z) values become (z, x, y) with an additional correction for root bones.
    YxBones,
}

impl Orientation {
    /// Convert a stored animation sample to a local bone transform.
    ///
    /// The sample's bone length is not needed and is ignored.
    pub fn decode_sample(self, sample: &TrackSample, is_root: bool) -> Transform {
        self.decode(sample.rotation, sample.translation, sample.scale, is_root)
    }

    /// Convert a local bone transform to a stored animation sample.
    ///
    /// The `rest_length` is the bone's length in the rest pose
    /// and is scaled by the bone's primary scale axis.
    /// Root bones always store a length of 0.
    pub fn encode_sample(self, transform: Transform, is_root: bool, rest_length: f32) -> TrackSample {
        let (rotation, translation, scale) = self.encode(transform, is_root);
        let bone_length = if is_root {
            0.0
        } else {
            rest_length * self.primary_scale(transform.scale)
        };

        TrackSample {
            rotation,
            translation,
            bone_length,
            scale,
            reserved: 1.0,
        }
    }

    pub fn decode_rest(self, rest: &RestTransform, is_root: bool) -> Transform {
        self.decode(rest.rotation, rest.translation, rest.scale, is_root)
    }

    pub fn encode_rest(self, transform: Transform, is_root: bool) -> RestTransform {
        let (rotation, translation, scale) = self.encode(transform, is_root);
        RestTransform {
            translation,
            rotation,
            scale,
        }
    }

    /// The scale component along the axis bones point towards.
    pub fn primary_scale(self, scale: Vec3) -> f32 {
        match self {
            Orientation::Native => scale.x,
            Orientation::YxBones => scale.y,
        }
    }

    fn decode(self, r: [f32; 4], t: [f32; 3], s: [f32; 3], is_root: bool) -> Transform {
        let scale = decode_scale(s);
        match self {
            Orientation::Native => Transform {
                translation: Vec3::from_array(t),
                rotation: Quat::from_array(r),
                scale,
            },
            Orientation::YxBones => {
                let mut rotation = Quat::from_xyzw(r[2], r[0], r[1], r[3]);
                if is_root {
                    rotation *= YX_ROOT_DECODE;
                }
                Transform {
                    translation: vec3(t[2], t[0], t[1]),
                    rotation,
                    scale: vec3(scale.z, scale.x, scale.y),
                }
            }
        }
    }

    fn encode(self, transform: Transform, is_root: bool) -> ([f32; 4], [f32; 3], [f32; 3]) {
        let Transform {
            translation: t,
            rotation,
            scale: s,
        } = transform;

        match self {
            Orientation::Native => (rotation.to_array(), t.to_array(), s.to_array()),
            Orientation::YxBones => {
                let r = if is_root {
                    rotation * YX_ROOT_ENCODE
                } else {
                    rotation
                };
                ([r.y, r.z, r.x, r.w], [t.y, t.z, t.x], [s.y, s.z, s.x])
            }
        }
    }
}

/// Convert a stored root motion sample to the transform of the whole skeleton.
pub fn decode_root_motion(sample: &TrackSample) -> Transform {
    let [x, y, z] = sample.translation;
    Transform {
        translation: vec3(x, -z, y),
        rotation: ROOT_MOTION_DECODE * Quat::from_array(sample.rotation),
        scale: decode_scale(sample.scale),
    }
}

/// Convert the transform of the whole skeleton to a stored root motion sample.
pub fn encode_root_motion(transform: Transform) -> TrackSample {
    let Vec3 { x, y, z } = transform.translation;
    TrackSample {
        rotation: (ROOT_MOTION_ENCODE * transform.rotation).to_array(),
        translation: [x, z, -y],
        bone_length: 0.0,
        scale: transform.scale.to_array(),
        reserved: 1.0,
    }
}

// A scale of exactly zero means the scale was never set.
fn decode_scale(s: [f32; 3]) -> Vec3 {
    if s == [0.0; 3] {
        Vec3::ONE
    } else {
        Vec3::from_array(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::relative_eq;

    macro_rules! assert_array_relative_eq {
        ($a:expr, $b:expr) => {
            assert!(
                $a.iter()
                    .zip($b.iter())
                    .all(|(a, b)| relative_eq!(a, b, epsilon = 0.0001f32)),
                "Arrays not equal to within 0.0001.\nleft = {:?}\nright = {:?}",
                $a,
                $b
            )
        };
    }

    fn sample() -> TrackSample {
        let rotation = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.2, 2.0);
        TrackSample {
            rotation: rotation.to_array(),
            translation: [1.0, -2.0, 3.0],
            bone_length: 0.5,
            scale: [1.5, 2.0, 0.5],
            reserved: 1.0,
        }
    }

    fn assert_sample_eq(expected: TrackSample, actual: TrackSample) {
        assert_array_relative_eq!(expected.rotation, actual.rotation);
        assert_array_relative_eq!(expected.translation, actual.translation);
        assert_array_relative_eq!(expected.scale, actual.scale);
    }

    #[test]
    fn native_decode_encode() {
        for is_root in [true, false] {
            let transform = Orientation::Native.decode_sample(&sample(), is_root);
            assert_eq!(vec3(1.0, -2.0, 3.0), transform.translation);
            assert_sample_eq(sample(), Orientation::Native.encode_sample(transform, is_root, 1.0));
        }
    }

    #[test]
    fn yx_decode_encode() {
        for is_root in [true, false] {
            let transform = Orientation::YxBones.decode_sample(&sample(), is_root);
            assert_eq!(vec3(3.0, 1.0, -2.0), transform.translation);
            assert_eq!(vec3(0.5, 1.5, 2.0), transform.scale);
            assert_sample_eq(
                sample(),
                Orientation::YxBones.encode_sample(transform, is_root, 1.0),
            );
        }
    }

    #[test]
    fn yx_encode_decode() {
        let transform = Transform {
            translation: vec3(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.7),
            scale: vec3(1.0, 2.0, 3.0),
        };
        for is_root in [true, false] {
            let sample = Orientation::YxBones.encode_sample(transform, is_root, 1.0);
            assert_eq!([2.0, 3.0, 1.0], sample.translation);
            let new_transform = Orientation::YxBones.decode_sample(&sample, is_root);
            assert!(new_transform.translation.abs_diff_eq(transform.translation, 0.0001));
            assert!(new_transform.rotation.abs_diff_eq(transform.rotation, 0.0001));
            assert!(new_transform.scale.abs_diff_eq(transform.scale, 0.0001));
        }
    }

    #[test]
    fn yx_root_correction() {
        let identity = TrackSample::IDENTITY;
        let root = Orientation::YxBones.decode_sample(&identity, true);
        let child = Orientation::YxBones.decode_sample(&identity, false);
        assert_eq!(Quat::from_xyzw(-0.5, -0.5, -0.5, 0.5), root.rotation);
        assert_eq!(Quat::IDENTITY, child.rotation);
    }

    #[test]
    fn rest_decode_encode() {
        let rest = RestTransform {
            translation: [1.0, 2.0, 3.0],
            rotation: Quat::from_rotation_x(1.0).to_array(),
            scale: [1.0, 1.0, 1.0],
        };
        for orientation in [Orientation::Native, Orientation::YxBones] {
            for is_root in [true, false] {
                let transform = orientation.decode_rest(&rest, is_root);
                let new_rest = orientation.encode_rest(transform, is_root);
                assert_array_relative_eq!(rest.translation, new_rest.translation);
                assert_array_relative_eq!(rest.rotation, new_rest.rotation);
                assert_array_relative_eq!(rest.scale, new_rest.scale);
            }
        }
    }

    #[test]
    fn zero_scale_decodes_as_one() {
        let transform = Transform {
            scale: Vec3::ZERO,
            ..Transform::IDENTITY
        };
        for orientation in [Orientation::Native, Orientation::YxBones] {
            let sample = orientation.encode_sample(transform, false, 1.0);
            assert_eq!([0.0; 3], sample.scale);
            assert_eq!(Vec3::ONE, orientation.decode_sample(&sample, false).scale);
        }
        assert_eq!(
            Vec3::ONE,
            decode_root_motion(&encode_root_motion(transform)).scale
        );
    }

    #[test]
    fn bone_length_primary_axis() {
        let transform = Transform {
            scale: vec3(2.0, 3.0, 4.0),
            ..Transform::IDENTITY
        };
        assert_eq!(
            1.0,
            Orientation::Native
                .encode_sample(transform, false, 0.5)
                .bone_length
        );
        assert_eq!(
            1.5,
            Orientation::YxBones
                .encode_sample(transform, false, 0.5)
                .bone_length
        );
        assert_eq!(
            0.0,
            Orientation::YxBones
                .encode_sample(transform, true, 0.5)
                .bone_length
        );
    }

    #[test]
    fn root_motion_translation() {
        let sample = TrackSample {
            translation: [1.0, 2.0, 3.0],
            ..TrackSample::IDENTITY
        };
        let transform = decode_root_motion(&sample);
        assert_eq!(vec3(1.0, -3.0, 2.0), transform.translation);
        assert_eq!(
            Quat::from_xyzw(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2),
            transform.rotation
        );
        assert_eq!(0.0, encode_root_motion(transform).bone_length);
        assert_sample_eq(sample, encode_root_motion(transform));
    }

    #[test]
    fn root_motion_decode_encode() {
        let transform = decode_root_motion(&sample());
        assert_sample_eq(sample(), encode_root_motion(transform));
    }
}
