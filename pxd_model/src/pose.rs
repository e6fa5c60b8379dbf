//! Bone transforms for a single frame using the standard convention for 3D applications.
//!
//! Unlike the transforms in [bone_space](crate::bone_space),
//! parent scale also scales child translations for a [Pose].
//! Scale accumulates component-wise and never shears child rotations,
//! so each bone's local scale is its own scale without any inherited scale.
use glam::{Mat4, Vec3};
use indexmap::IndexMap;
use log::warn;

use crate::{Skeleton, Transform, bone_space};

/// The local transform for each bone by name.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Pose {
    pub bones: IndexMap<String, BonePose>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct BonePose {
    pub parent_name: Option<String>,
    /// The transform relative to the parent bone.
    pub transform: Transform,
}

impl Pose {
    /// Create a pose from global transforms computed by [bone_space::global_transforms].
    pub fn from_global_transforms(skeleton: &Skeleton, globals: &[Transform]) -> Self {
        let global = |i: usize| globals.get(i).copied().unwrap_or(Transform::IDENTITY);

        let bones = skeleton
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| {
                let parent = bone.parent_index.and_then(|p| skeleton.bones.get(p).map(|b| (p, b)));
                let transform = match parent {
                    Some((p, _)) => relative(global(i), global(p)),
                    None => global(i),
                };
                let pose = BonePose {
                    parent_name: parent.map(|(_, p)| p.name.clone()),
                    transform,
                };
                (bone.name.clone(), pose)
            })
            .collect();

        Self { bones }
    }

    /// The accumulated transform for the bone `name`.
    ///
    /// Returns `None` if the bone is not in the pose.
    pub fn global_transform(&self, name: &str) -> Option<Transform> {
        let mut bone = self.bones.get(name)?;
        let mut chain = vec![bone.transform];

        while let Some(parent) = bone.parent_name.as_ref().and_then(|p| self.bones.get(p)) {
            if chain.len() > self.bones.len() {
                warn!("Bone {name:?} is part of a cycle in the pose hierarchy.");
                break;
            }
            chain.push(parent.transform);
            bone = parent;
        }

        // Accumulate from the root since scale does not shear rotations.
        chain.into_iter().rev().reduce(compose)
    }

    /// The accumulated matrix for the bone `name`.
    ///
    /// Returns `None` if the bone is not in the pose.
    pub fn global_matrix(&self, name: &str) -> Option<Mat4> {
        self.global_transform(name).map(Transform::to_matrix)
    }

    /// The global transforms for each bone in `skeleton` for use with [bone_space::local_transforms].
    ///
    /// Bones missing from the pose stay at the location of their parent.
    pub fn global_transforms(&self, skeleton: &Skeleton, order: &[usize]) -> Vec<Transform> {
        let mut globals = vec![Transform::IDENTITY; skeleton.bones.len()];
        for i in order {
            let bone = &skeleton.bones[*i];
            globals[*i] = match self.global_transform(&bone.name) {
                Some(transform) => transform,
                None => bone
                    .parent_index
                    .map(|p| globals[p])
                    .unwrap_or(Transform::IDENTITY),
            };
        }
        globals
    }

    /// The scale of each bone in `skeleton` without the scale inherited from its parent.
    pub fn local_scales(&self, skeleton: &Skeleton) -> Vec<Vec3> {
        skeleton
            .bones
            .iter()
            .map(|b| {
                self.bones
                    .get(&b.name)
                    .map(|p| p.transform.scale)
                    .unwrap_or(Vec3::ONE)
            })
            .collect()
    }

    /// Convert to the local transforms used for animation tracks.
    pub fn local_transforms(&self, skeleton: &Skeleton, order: &[usize]) -> Vec<Transform> {
        let globals = self.global_transforms(skeleton, order);
        let scales = self.local_scales(skeleton);
        bone_space::local_transforms_ordered(skeleton, order, &globals, &scales)
    }
}

fn compose(parent: Transform, local: Transform) -> Transform {
    Transform {
        translation: parent.rotation * (parent.scale * local.translation) + parent.translation,
        rotation: parent.rotation * local.rotation,
        scale: parent.scale * local.scale,
    }
}

// Zero parent scale components leave the corresponding child values unchanged.
fn relative(global: Transform, parent: Transform) -> Transform {
    let inverse = parent.rotation.inverse();
    Transform {
        translation: divide(inverse * (global.translation - parent.translation), parent.scale),
        rotation: inverse * global.rotation,
        scale: divide(global.scale, parent.scale),
    }
}

fn divide(value: Vec3, scale: Vec3) -> Vec3 {
    Vec3::select(scale.cmpeq(Vec3::ZERO), value, value / scale)
}
