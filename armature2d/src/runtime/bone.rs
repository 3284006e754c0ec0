use crate::{BoneData, Matrix, Transform};

/// Runtime node of the bone hierarchy.
///
/// Dependents never get notified; they poll [`Bone::children_transform_dirty`] during the
/// same update pass, after the bone itself has been updated.
#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,
    pub visible: bool,

    origin: Transform,
    /// Animated pose layered over the setup transform.
    offset: Transform,
    global: Transform,
    global_transform_matrix: Matrix,

    transform_dirty: bool,
    children_transform_dirty: bool,
}

impl Bone {
    pub(crate) fn new(data_index: usize, data: &BoneData) -> Self {
        Self {
            data_index,
            parent: data.parent,
            visible: true,
            origin: data.transform,
            offset: Transform::IDENTITY,
            global: data.transform,
            global_transform_matrix: Matrix::IDENTITY,
            transform_dirty: true,
            children_transform_dirty: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn origin(&self) -> &Transform {
        &self.origin
    }

    pub fn offset(&self) -> &Transform {
        &self.offset
    }

    /// Applies an animated pose; the bone and its subtree recompute on the next update.
    pub fn set_offset(&mut self, offset: Transform) {
        if self.offset != offset {
            self.offset = offset;
            self.transform_dirty = true;
        }
    }

    pub fn global(&self) -> &Transform {
        &self.global
    }

    pub fn global_transform_matrix(&self) -> &Matrix {
        &self.global_transform_matrix
    }

    /// Whether this bone or an ancestor recomputed its world transform in the current pass.
    pub fn children_transform_dirty(&self) -> bool {
        self.children_transform_dirty
    }

    pub fn invalidate_update(&mut self) {
        self.transform_dirty = true;
    }

    pub(crate) fn update(&mut self, parent: Option<&Bone>) {
        let parent_dirty = parent.is_some_and(Bone::children_transform_dirty);
        if !self.transform_dirty && !parent_dirty {
            self.children_transform_dirty = false;
            return;
        }

        let local = (self.origin + self.offset).to_matrix();
        self.global_transform_matrix = match parent {
            Some(parent) => local.concat(&parent.global_transform_matrix),
            None => local,
        };
        self.global.set_from_matrix(&self.global_transform_matrix);
        self.transform_dirty = false;
        self.children_transform_dirty = true;
    }
}
