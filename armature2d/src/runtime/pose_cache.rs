use crate::{Matrix, Transform};

/// Handle of one stored world pose in a [`PoseCache`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PoseId(u32);

impl PoseId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CachedPose {
    pub matrix: Matrix,
    pub transform: Transform,
}

/// Append-only arena of world poses shared by every slot of one armature instance.
///
/// Slots only keep [`PoseId`]s; evicting the cache is a single [`PoseCache::clear`].
#[derive(Clone, Debug, Default)]
pub struct PoseCache {
    poses: Vec<CachedPose>,
}

impl PoseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_and_store(&mut self, matrix: &Matrix, transform: &Transform) -> PoseId {
        let id = PoseId(u32::try_from(self.poses.len()).unwrap_or(u32::MAX));
        self.poses.push(CachedPose {
            matrix: *matrix,
            transform: *transform,
        });
        log::trace!("pose cache: stored pose {}", id.0);
        id
    }

    pub fn fetch(&self, id: PoseId) -> Option<&CachedPose> {
        self.poses.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.poses.is_empty() {
            log::debug!("pose cache: evicting {} poses", self.poses.len());
        }
        self.poses.clear();
    }
}
