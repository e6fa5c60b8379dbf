//! Conversions between local bone transforms as stored and global bone transforms.
//!
//! Stored local transforms are relative to the parent with the parent's scale removed.
//! Scale accumulates down the hierarchy but never moves child bones.
//! This means a child's global translation and rotation only depend on
//! the translation and rotation of its ancestors.
use glam::Vec3;

use crate::{Skeleton, Transform, error::SkeletonError};

/// Accumulate `locals` down the hierarchy of `skeleton`.
///
/// Bones without a local transform use [Transform::IDENTITY].
/// Extra local transforms are ignored.
pub fn global_transforms(
    skeleton: &Skeleton,
    locals: &[Transform],
) -> Result<Vec<Transform>, SkeletonError> {
    let order = skeleton.hierarchy_order()?;
    Ok(global_transforms_ordered(skeleton, &order, locals))
}

/// Compute the local transforms for `globals` that produce the same result with [global_transforms].
///
/// Global scale is not stored, so each bone uses its corresponding value in `scales` instead.
/// Bones without a global transform use [Transform::IDENTITY].
pub fn local_transforms(
    skeleton: &Skeleton,
    globals: &[Transform],
    scales: &[Vec3],
) -> Result<Vec<Transform>, SkeletonError> {
    let order = skeleton.hierarchy_order()?;
    Ok(local_transforms_ordered(skeleton, &order, globals, scales))
}

/// [global_transforms] with the result of [Skeleton::hierarchy_order]
/// to avoid recomputing the order for every frame.
pub(crate) fn global_transforms_ordered(
    skeleton: &Skeleton,
    order: &[usize],
    locals: &[Transform],
) -> Vec<Transform> {
    let mut globals = vec![Transform::IDENTITY; skeleton.bones.len()];
    for i in order {
        let local = locals.get(*i).copied().unwrap_or(Transform::IDENTITY);
        globals[*i] = match skeleton.bones[*i].parent_index {
            Some(parent) => globals[parent] * local,
            None => local,
        };
    }
    globals
}

pub(crate) fn local_transforms_ordered(
    skeleton: &Skeleton,
    order: &[usize],
    globals: &[Transform],
    scales: &[Vec3],
) -> Vec<Transform> {
    let global = |i: usize| globals.get(i).copied().unwrap_or(Transform::IDENTITY);

    let mut locals = vec![Transform::IDENTITY; skeleton.bones.len()];
    for i in order {
        let unscaled = global(*i).unscaled();
        let local = match skeleton.bones[*i].parent_index {
            Some(parent) => unscaled.relative_to(global(parent).unscaled()),
            None => unscaled,
        };
        locals[*i] = Transform {
            scale: scales.get(*i).copied().unwrap_or(Vec3::ONE),
            ..local
        };
    }
    locals
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::Bone;
    use glam::{Quat, vec3};

    fn skeleton() -> Skeleton {
        Skeleton {
            bones: vec![
                Bone {
                    name: "root".to_string(),
                    transform: Transform::IDENTITY,
                    parent_index: None,
                },
                Bone {
                    name: "child".to_string(),
                    transform: Transform::IDENTITY,
                    parent_index: Some(0),
                },
                Bone {
                    name: "grandchild".to_string(),
                    transform: Transform::IDENTITY,
                    parent_index: Some(1),
                },
            ],
        }
    }

    #[test]
    fn global_scale_does_not_move_children() {
        let locals = [
            Transform {
                scale: vec3(2.0, 2.0, 2.0),
                ..Transform::IDENTITY
            },
            Transform {
                translation: vec3(1.0, 0.0, 0.0),
                ..Transform::IDENTITY
            },
        ];

        let globals = global_transforms(&skeleton(), &locals).unwrap();
        assert_eq!(vec3(1.0, 0.0, 0.0), globals[1].translation);
        assert_eq!(vec3(2.0, 2.0, 2.0), globals[1].scale);
        // Missing bones still inherit their parent.
        assert_eq!(vec3(1.0, 0.0, 0.0), globals[2].translation);
        assert_eq!(vec3(2.0, 2.0, 2.0), globals[2].scale);
    }

    #[test]
    fn local_global_round_trip() {
        let locals = vec![
            Transform {
                translation: vec3(0.0, 1.0, 0.0),
                rotation: Quat::from_rotation_x(-0.5),
                scale: vec3(2.0, 1.0, 1.0),
            },
            Transform {
                translation: vec3(1.0, 0.0, 0.5),
                rotation: Quat::from_rotation_y(1.2),
                scale: vec3(0.5, 0.5, 0.5),
            },
            Transform {
                translation: vec3(0.0, 0.0, 2.0),
                rotation: Quat::from_rotation_z(0.3),
                scale: vec3(1.0, 3.0, 1.0),
            },
        ];
        let scales: Vec<_> = locals.iter().map(|t| t.scale).collect();

        let globals = global_transforms(&skeleton(), &locals).unwrap();
        let new_locals = local_transforms(&skeleton(), &globals, &scales).unwrap();

        for (expected, actual) in locals.iter().zip(&new_locals) {
            assert!(expected.translation.abs_diff_eq(actual.translation, 0.0001));
            assert!(expected.rotation.abs_diff_eq(actual.rotation, 0.0001));
            assert_eq!(expected.scale, actual.scale);
        }
    }

    #[test]
    fn local_transforms_missing_globals() {
        let locals = local_transforms(&skeleton(), &[], &[]).unwrap();
        assert_eq!(vec![Transform::IDENTITY; 3], locals);
    }
}
