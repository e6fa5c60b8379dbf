use std::ops::Mul;

use glam::{Mat4, Quat, Vec3};

/// A decomposed transform as scale -> rotation -> translation (TRS).
///
/// Scale does not affect translation when multiplying [Transform].
/// This matches how bones in skeletons and animations inherit their parent transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_matrix(value: Mat4) -> Self {
        let (scale, rotation, translation) = value.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// The same transform with unit scale.
    pub fn unscaled(self) -> Self {
        Self {
            scale: Vec3::ONE,
            ..self
        }
    }

    /// The translation and rotation relative to `parent` while keeping the current scale.
    ///
    /// This undoes multiplying by `parent` for everything except scale.
    pub fn relative_to(self, parent: Transform) -> Self {
        let inverse = parent.rotation.inverse();
        Self {
            translation: inverse * (self.translation - parent.translation),
            rotation: inverse * self.rotation,
            scale: self.scale,
        }
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Self::Output {
        Transform {
            translation: self.rotation.mul_vec3(rhs.translation) + self.translation,
            rotation: self.rotation * rhs.rotation,
            scale: self.scale * rhs.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::relative_eq;
    use glam::{quat, vec3};

    #[test]
    fn transform_to_matrix() {
        assert_eq!(
            Mat4::from_cols_array_2d(&[
                [4.0, 0.0, 0.0, 0.0],
                [0.0, -5.0, 0.0, 0.0],
                [0.0, 0.0, -6.0, 0.0],
                [1.0, 2.0, 3.0, 1.0],
            ]),
            Transform {
                translation: vec3(1.0, 2.0, 3.0),
                rotation: quat(1.0, 0.0, 0.0, 0.0),
                scale: vec3(4.0, 5.0, 6.0),
            }
            .to_matrix()
        );
    }

    #[test]
    fn transform_from_matrix() {
        assert_eq!(
            Transform {
                translation: vec3(1.0, 2.0, 3.0),
                rotation: quat(1.0, 0.0, 0.0, 0.0),
                scale: vec3(4.0, 5.0, 6.0),
            },
            Transform::from_matrix(Mat4::from_cols_array_2d(&[
                [4.0, 0.0, 0.0, 0.0],
                [0.0, -5.0, 0.0, 0.0],
                [0.0, 0.0, -6.0, 0.0],
                [1.0, 2.0, 3.0, 1.0],
            ]))
        );
    }

    #[test]
    fn mul_scale_does_not_affect_translation() {
        let parent = Transform {
            scale: vec3(2.0, 2.0, 2.0),
            ..Transform::IDENTITY
        };
        let child = Transform {
            translation: vec3(1.0, 0.0, 0.0),
            ..Transform::IDENTITY
        };
        assert_eq!(
            Transform {
                translation: vec3(1.0, 0.0, 0.0),
                rotation: Quat::IDENTITY,
                scale: vec3(2.0, 2.0, 2.0),
            },
            parent * child
        );
    }

    #[test]
    fn relative_to_parent() {
        let parent = Transform {
            translation: vec3(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(1.0),
            scale: vec3(3.0, 3.0, 3.0),
        };
        let child = Transform {
            translation: vec3(-1.0, 0.5, 2.0),
            rotation: Quat::from_rotation_x(0.5),
            scale: vec3(0.5, 0.5, 0.5),
        };

        let local = (parent * child).relative_to(parent);
        assert!(local.translation.abs_diff_eq(child.translation, 0.0001));
        assert!(local.rotation.abs_diff_eq(child.rotation, 0.0001));
        assert!(relative_eq!(1.5, local.scale.x, epsilon = 0.0001));
    }
}
