use std::collections::VecDeque;

use log::warn;
use pxd_lib::ksxp::{BoneName, Ksxp};

use crate::{Orientation, Transform, error::SkeletonError};

/// See [Ksxp].
#[derive(Debug, PartialEq, Clone)]
pub struct Skeleton {
    /// The hierarchy of bones in the skeleton.
    pub bones: Vec<Bone>,
}

/// A single node in the skeleton heirarchy.
#[derive(Debug, PartialEq, Clone)]
pub struct Bone {
    /// The name used by animation tracks and poses to identify this bone.
    pub name: String,
    /// The rest transform of the bone relative to its parent.
    pub transform: Transform,
    /// The index of the parent [Bone] in [bones](struct.Skeleton.html#structfield.bones)
    /// or `None` if this is a root bone.
    pub parent_index: Option<usize>,
}

/// Settings for [Skeleton::bone_lengths].
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BoneLengthOptions {
    pub min: f32,
    pub max: f32,
    /// The length for bones without children.
    pub leaf: LeafLength,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LeafLength {
    /// Use the length of the parent bone or the minimum for unparented bones.
    Parent,
    Custom(f32),
    Minimum,
}

impl Default for BoneLengthOptions {
    fn default() -> Self {
        Self {
            min: 0.025,
            max: 0.6,
            leaf: LeafLength::Parent,
        }
    }
}

impl Skeleton {
    /// Bones missing an entry in any of the tables in `ksxp` are skipped.
    pub fn from_ksxp(ksxp: &Ksxp, orientation: Orientation) -> Self {
        let counts = [
            ksxp.names.len(),
            ksxp.transforms.len(),
            ksxp.parent_indices.len(),
        ];
        if counts.iter().any(|c| *c != counts[0]) {
            warn!(
                "Bone name count {}, transform count {}, and parent count {} do not match.",
                counts[0], counts[1], counts[2]
            );
        }

        let bones = ksxp
            .names
            .iter()
            .zip(ksxp.transforms.iter())
            .zip(ksxp.parent_indices.iter())
            .map(|((name, transform), parent)| {
                let parent_index = (*parent).try_into().ok();
                Bone {
                    name: name.name.clone(),
                    transform: orientation.decode_rest(transform, parent_index.is_none()),
                    parent_index,
                }
            })
            .collect();

        Self { bones }
    }

    pub fn to_ksxp(&self, orientation: Orientation) -> Result<Ksxp, SkeletonError> {
        let max = i16::MAX as usize;
        if self.bones.len() > max {
            return Err(SkeletonError::TooManyBones {
                count: self.bones.len(),
                max,
            });
        }

        Ok(Ksxp {
            parent_indices: self
                .bones
                .iter()
                .map(|b| b.parent_index.map(|p| p as i16).unwrap_or(-1))
                .collect(),
            names: self
                .bones
                .iter()
                .map(|b| BoneName {
                    name: b.name.clone(),
                })
                .collect(),
            transforms: self
                .bones
                .iter()
                .map(|b| orientation.encode_rest(b.transform, b.parent_index.is_none()))
                .collect(),
        })
    }

    /// The index of the bone named `name`.
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Bone indices ordered so that every bone appears after its parent.
    ///
    /// Bones are visited breadth first starting from the root bones in index order.
    pub fn hierarchy_order(&self) -> Result<Vec<usize>, SkeletonError> {
        let children = self.children()?;

        let mut order = Vec::with_capacity(self.bones.len());
        let mut queue: VecDeque<_> = self
            .bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent_index.is_none())
            .map(|(i, _)| i)
            .collect();

        while let Some(i) = queue.pop_front() {
            order.push(i);
            queue.extend(children[i].iter().copied());
        }

        // Bones not reachable from a root can only be part of a cycle.
        if order.len() < self.bones.len() {
            let mut visited = vec![false; self.bones.len()];
            for i in &order {
                visited[*i] = true;
            }
            let index = visited.iter().position(|v| !v).unwrap_or_default();
            return Err(SkeletonError::Cycle { index });
        }

        Ok(order)
    }

    /// The global rest transform of each bone.
    ///
    /// Parent scale is inherited without affecting the translation of child bones.
    pub fn model_space_transforms(&self) -> Result<Vec<Transform>, SkeletonError> {
        let mut final_transforms: Vec<_> = self.bones.iter().map(|b| b.transform).collect();

        for i in self.hierarchy_order()? {
            if let Some(parent) = self.bones[i].parent_index {
                final_transforms[i] = final_transforms[parent] * self.bones[i].transform;
            }
        }

        Ok(final_transforms)
    }

    /// The rest length of each bone.
    ///
    /// A bone points towards the child with the most descendants.
    /// The first child wins any ties.
    pub fn bone_lengths(&self, options: &BoneLengthOptions) -> Result<Vec<f32>, SkeletonError> {
        let order = self.hierarchy_order()?;
        let children = self.children()?;
        let globals = self.model_space_transforms()?;

        let mut descendants = vec![0usize; self.bones.len()];
        for i in order.iter().rev() {
            if let Some(parent) = self.bones[*i].parent_index {
                descendants[parent] += descendants[*i] + 1;
            }
        }

        let mut lengths = vec![options.min; self.bones.len()];
        for i in order {
            let mut tail = None;
            for c in &children[i] {
                if tail.is_none_or(|t| descendants[*c] > descendants[t]) {
                    tail = Some(*c);
                }
            }

            let length = match tail {
                Some(c) => globals[i].translation.distance(globals[c].translation),
                None => match options.leaf {
                    LeafLength::Parent => self.bones[i]
                        .parent_index
                        .map(|p| lengths[p])
                        .unwrap_or(options.min),
                    LeafLength::Custom(length) => length,
                    LeafLength::Minimum => options.min,
                },
            };
            lengths[i] = length.clamp(options.min, options.max);
        }

        Ok(lengths)
    }

    fn children(&self) -> Result<Vec<Vec<usize>>, SkeletonError> {
        let count = self.bones.len();
        let mut children = vec![Vec::new(); count];
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent_index {
                if parent >= count {
                    return Err(SkeletonError::ParentOutOfRange {
                        index,
                        parent,
                        count,
                    });
                }
                children[parent].push(index);
            }
        }
        Ok(children)
    }
}
