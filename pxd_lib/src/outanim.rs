//! Legacy uncompressed animations in `.outanim` files.
//!
//! These files have no container and store every track for every frame.
use binrw::{BinRead, BinWrite};

use crate::tracks::TrackSample;

#[derive(Debug, BinRead, BinWrite, PartialEq, Clone)]
pub struct OutAnim {
    /// The length in seconds.
    pub duration: f32,
    pub frame_count: u32,
    pub bone_count: u32,
    /// Samples for all bones in the first frame followed by all bones in the next frame and so on.
    #[br(count = frame_count as usize * bone_count as usize)]
    pub samples: Vec<TrackSample>,
}

impl OutAnim {
    /// The samples for each frame.
    pub fn frames(&self) -> Vec<Vec<TrackSample>> {
        if self.bone_count == 0 {
            return vec![Vec::new(); self.frame_count as usize];
        }
        self.samples
            .chunks(self.bone_count as usize)
            .map(|c| c.to_vec())
            .collect()
    }
}
