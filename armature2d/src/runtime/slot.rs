use crate::model::{same_arc, same_display_data};
use crate::{
    ActionData, ArmatureData, BlendMode, Bone, BoundingBox, BoundingBoxDisplayData, ChildArmature,
    ClockId, ColorTransform, Display, DisplayAdapter, DisplayData, DisplayDataList, FrameState,
    Matrix, MeshDisplayData, MeshState, Point, PoseCache, PoseId, SegmentIntersection, SlotData,
    TextureData, Transform, TransformState,
};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Independent change flags, resolved by [`Slot::update`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SlotDirtyFlags {
    pub display: bool,
    pub z_order: bool,
    pub visible: bool,
    pub blend_mode: bool,
    pub color: bool,
    pub mesh: bool,
    pub transform: bool,
}

impl SlotDirtyFlags {
    pub fn any(&self) -> bool {
        self.display
            || self.z_order
            || self.visible
            || self.blend_mode
            || self.color
            || self.mesh
            || self.transform
    }
}

/// Armature-owned state a slot reads (and for the pose cache, writes) while updating.
pub struct SlotContext<'a> {
    pub data: &'a ArmatureData,
    pub bones: &'a [Bone],
    pub pose_cache: &'a mut PoseCache,
    pub clock: Option<ClockId>,
    pub cache_frame_rate: u32,
}

/// Attachment point on a bone showing at most one display out of its display list.
pub struct Slot<A: DisplayAdapter> {
    data: Option<Arc<SlotData>>,
    parent: Option<usize>,
    adapter: A,
    attached: bool,

    visible: bool,
    blend_mode: BlendMode,
    z_order: i32,
    color: ColorTransform,
    display_index: Option<usize>,
    animation_display_index: Option<usize>,

    display_list: Vec<Option<Display<A>>>,
    raw_display_datas: Option<DisplayDataList>,
    display_datas: Vec<Option<DisplayData>>,
    raw_display: Option<A::Display>,
    mesh_display: Option<A::Display>,
    display: Option<A::Display>,
    child_armature: Option<ChildArmature<A>>,

    display_data: Option<DisplayData>,
    texture_data: Option<Arc<TextureData>>,
    mesh_data: Option<Arc<MeshDisplayData>>,
    bounding_box_data: Option<Arc<BoundingBoxDisplayData>>,
    pivot: Point,

    ffd_vertices: Vec<f32>,
    deformed_vertices: Vec<f32>,
    mesh_bones: Vec<Option<usize>>,

    origin: Option<Transform>,
    offset: Transform,
    local_matrix: Matrix,
    global_transform_matrix: Matrix,
    global: Transform,
    global_dirty: bool,
    cached_pose: Option<PoseId>,
    cached_frame_indices: HashMap<usize, PoseId>,

    dirty: SlotDirtyFlags,
}

impl<A: DisplayAdapter> fmt::Debug for Slot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name())
            .field("parent", &self.parent)
            .field("display_index", &self.display_index)
            .field("display", &self.display)
            .field("dirty", &self.dirty)
            .field("cached_pose", &self.cached_pose)
            .finish_non_exhaustive()
    }
}

impl<A: DisplayAdapter> Slot<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            data: None,
            parent: None,
            adapter,
            attached: false,
            visible: true,
            blend_mode: BlendMode::Normal,
            z_order: 0,
            color: ColorTransform::IDENTITY,
            display_index: None,
            animation_display_index: None,
            display_list: Vec::new(),
            raw_display_datas: None,
            display_datas: Vec::new(),
            raw_display: None,
            mesh_display: None,
            display: None,
            child_armature: None,
            display_data: None,
            texture_data: None,
            mesh_data: None,
            bounding_box_data: None,
            pivot: Point::ZERO,
            ffd_vertices: Vec::new(),
            deformed_vertices: Vec::new(),
            mesh_bones: Vec::new(),
            origin: None,
            offset: Transform::IDENTITY,
            local_matrix: Matrix::IDENTITY,
            global_transform_matrix: Matrix::IDENTITY,
            global: Transform::IDENTITY,
            global_dirty: false,
            cached_pose: None,
            cached_frame_indices: HashMap::new(),
            dirty: SlotDirtyFlags::default(),
        }
    }

    /// Binds the static configuration and the built-in placeholders. No-op once bound.
    pub fn init(
        &mut self,
        data: Arc<SlotData>,
        display_datas: Option<DisplayDataList>,
        raw_display: A::Display,
        mesh_display: A::Display,
    ) {
        if self.data.is_some() {
            return;
        }

        self.parent = Some(data.bone);
        self.dirty.visible = true;
        self.dirty.blend_mode = true;
        self.dirty.color = true;
        self.blend_mode = data.blend_mode;
        self.z_order = data.z_order;
        self.color = data.color;
        self.raw_display = Some(raw_display);
        self.mesh_display = Some(mesh_display);
        self.data = Some(data);
        self.set_raw_display_datas(display_datas);
    }

    pub fn name(&self) -> &str {
        self.data.as_deref().map_or("", |data| data.name.as_str())
    }

    pub fn data(&self) -> Option<&Arc<SlotData>> {
        self.data.as_ref()
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn dirty(&self) -> SlotDirtyFlags {
        self.dirty
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty.visible = true;
        }
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if self.blend_mode != blend_mode {
            self.blend_mode = blend_mode;
            self.dirty.blend_mode = true;
        }
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    /// Always marks the z-order dirty, even when `z_order` is unchanged.
    pub fn set_z_order(&mut self, z_order: i32) -> bool {
        self.z_order = z_order;
        self.dirty.z_order = true;
        true
    }

    pub fn color(&self) -> &ColorTransform {
        &self.color
    }

    pub fn set_color(&mut self, color: &ColorTransform) -> bool {
        self.color = *color;
        self.dirty.color = true;
        true
    }

    pub fn origin(&self) -> Option<&Transform> {
        self.origin.as_ref()
    }

    pub fn offset(&self) -> &Transform {
        &self.offset
    }

    pub fn set_offset(&mut self, offset: Transform) {
        if self.offset != offset {
            self.offset = offset;
            self.invalid_update();
        }
    }

    /// Forces display and transform resolution on the next update.
    pub fn invalid_update(&mut self) {
        self.dirty.display = true;
        self.dirty.transform = true;
    }

    pub fn display_index(&self) -> Option<usize> {
        self.display_index
    }

    pub fn animation_display_index(&self) -> Option<usize> {
        self.animation_display_index
    }

    /// Selects a display directly and refreshes the slot right away if anything changed.
    pub fn set_display_index(&mut self, value: Option<usize>, ctx: &mut SlotContext<'_>) {
        if self.select_display_index(value, false, ctx) {
            self.update(None, ctx);
        }
    }

    /// Animation-driven selection. Tracked separately from direct overrides and applied on the
    /// next update tick. Returns whether the display needs to be refreshed.
    pub fn apply_animation_display_index(
        &mut self,
        value: Option<usize>,
        ctx: &SlotContext<'_>,
    ) -> bool {
        self.select_display_index(value, true, ctx)
    }

    fn select_display_index(
        &mut self,
        value: Option<usize>,
        is_animation: bool,
        ctx: &SlotContext<'_>,
    ) -> bool {
        if is_animation {
            if self.animation_display_index == value {
                return false;
            }
            self.animation_display_index = value;
        }
        if self.display_index == value {
            return false;
        }

        self.display_index = value;
        self.dirty.display = true;
        self.update_display_data(ctx);
        self.dirty.display
    }

    pub fn display_list(&self) -> &[Option<Display<A>>] {
        &self.display_list
    }

    /// Replaces the whole display list. Entries that are no longer referenced are disposed,
    /// except for the built-in placeholders.
    pub fn set_display_list(
        &mut self,
        value: Vec<Option<Display<A>>>,
        ctx: &mut SlotContext<'_>,
    ) {
        let backup = self.display_list.clone();
        if self.replace_display_list(value, ctx) {
            self.update(None, ctx);
        }

        let mut released: Vec<Display<A>> = Vec::new();
        for entry in backup.into_iter().flatten() {
            if self.is_builtin_entry(&entry)
                || self.display_list.iter().flatten().any(|e| *e == entry)
                || released.contains(&entry)
            {
                continue;
            }
            released.push(entry);
        }
        for entry in released {
            self.dispose_entry(entry);
        }
    }

    pub(crate) fn replace_display_list(
        &mut self,
        value: Vec<Option<Display<A>>>,
        ctx: &SlotContext<'_>,
    ) -> bool {
        for (index, entry) in value.iter().enumerate() {
            let Some(Display::Visual(visual)) = entry else {
                continue;
            };
            if self.is_builtin(visual) {
                continue;
            }
            let known = self
                .display_list
                .iter()
                .chain(&value[..index])
                .flatten()
                .any(|e| e.as_visual() == Some(visual));
            if !known {
                self.adapter.init_display(visual);
            }
        }
        self.display_list = value;

        let selected = self
            .display_index
            .and_then(|index| self.display_list.get(index));
        let selection_changed = match selected {
            Some(Some(Display::Visual(visual))) => {
                self.display.as_ref() != Some(visual) || self.child_armature.is_some()
            }
            Some(Some(Display::Armature(child))) => !self
                .child_armature
                .as_ref()
                .is_some_and(|current| Rc::ptr_eq(current, child)),
            Some(None) | None => self.display.is_some(),
        };
        if selection_changed {
            self.dirty.display = true;
        }

        self.update_display_data(ctx);
        self.dirty.display
    }

    /// Replaces the entry at the current display index (index 0 for an empty, unselected slot).
    pub fn set_display(&mut self, value: Option<Display<A>>, ctx: &mut SlotContext<'_>) {
        let unchanged = match &value {
            Some(Display::Visual(visual)) => {
                self.display.as_ref() == Some(visual) && self.child_armature.is_none()
            }
            Some(Display::Armature(child)) => self
                .child_armature
                .as_ref()
                .is_some_and(|current| Rc::ptr_eq(current, child)),
            None => self.display.is_none() && self.child_armature.is_none(),
        };
        if unchanged {
            return;
        }

        if self.display_index.is_none() && self.display_list.is_empty() {
            self.display_index = Some(0);
        }
        let Some(index) = self.display_index else {
            return;
        };

        let mut list = self.display_list.clone();
        if list.len() <= index {
            list.resize_with(index + 1, || None);
        }
        list[index] = value;
        self.set_display_list(list, ctx);
    }

    pub fn set_child_armature(
        &mut self,
        child: Option<ChildArmature<A>>,
        ctx: &mut SlotContext<'_>,
    ) {
        let unchanged = match (&self.child_armature, &child) {
            (Some(current), Some(child)) => Rc::ptr_eq(current, child),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            self.set_display(child.map(Display::Armature), ctx);
        }
    }

    pub fn raw_display_datas(&self) -> Option<&DisplayDataList> {
        self.raw_display_datas.as_ref()
    }

    pub fn set_raw_display_datas(&mut self, value: Option<DisplayDataList>) {
        if same_arc(self.raw_display_datas.as_ref(), value.as_ref()) {
            return;
        }
        self.dirty.display = true;
        self.display_datas = value
            .as_deref()
            .map(|displays| displays.to_vec())
            .unwrap_or_default();
        self.raw_display_datas = value;
    }

    /// Runtime catalogue overrides, initially a copy of the raw catalogue.
    pub fn display_datas(&self) -> &[Option<DisplayData>] {
        &self.display_datas
    }

    /// Overrides one catalogue entry (the current index when `index` is `None`). Takes effect
    /// on the next display list or display index change.
    pub fn replace_display_data(&mut self, value: Option<DisplayData>, index: Option<usize>) {
        let index = index.or(self.display_index).unwrap_or(0);
        if self.display_datas.len() <= index {
            self.display_datas.resize_with(index + 1, || None);
        }
        self.display_datas[index] = value;
    }

    /// Swaps both the catalogue entry and the display list entry at `index`.
    pub fn replace_display(
        &mut self,
        display_data: Option<DisplayData>,
        display: Option<Display<A>>,
        index: Option<usize>,
        ctx: &mut SlotContext<'_>,
    ) {
        let index = index.or(self.display_index).unwrap_or(0);
        self.replace_display_data(display_data, Some(index));

        let mut list = self.display_list.clone();
        if list.len() <= index {
            list.resize_with(index + 1, || None);
        }
        list[index] = display;
        self.set_display_list(list, ctx);
    }

    pub fn raw_display(&self) -> Option<&A::Display> {
        self.raw_display.as_ref()
    }

    pub fn mesh_display(&self) -> Option<&A::Display> {
        self.mesh_display.as_ref()
    }

    /// The active renderable, or the root visual of the active child armature.
    pub fn display(&self) -> Option<&A::Display> {
        self.display.as_ref()
    }

    pub fn child_armature(&self) -> Option<&ChildArmature<A>> {
        self.child_armature.as_ref()
    }

    pub fn display_data(&self) -> Option<&DisplayData> {
        self.display_data.as_ref()
    }

    pub fn texture_data(&self) -> Option<&Arc<TextureData>> {
        self.texture_data.as_ref()
    }

    /// Mesh resolved for the current index, falling back to the raw catalogue entry.
    pub fn mesh_data(&self) -> Option<&Arc<MeshDisplayData>> {
        self.mesh_data.as_ref()
    }

    pub fn bounding_box_data(&self) -> Option<&BoundingBox> {
        self.bounding_box_data.as_deref().map(|data| &data.bounding_box)
    }

    pub fn pivot(&self) -> Point {
        self.pivot
    }

    /// Per-vertex deformation offsets, `2 * vertex_count` long while a mesh is resolved.
    pub fn ffd_vertices(&self) -> &[f32] {
        &self.ffd_vertices
    }

    /// Mutable deformation offsets; marks the mesh dirty.
    pub fn ffd_vertices_mut(&mut self) -> &mut [f32] {
        if self.mesh_data.is_some() {
            self.dirty.mesh = true;
        }
        &mut self.ffd_vertices
    }

    /// Result of the last mesh deformation.
    pub fn deformed_vertices(&self) -> &[f32] {
        &self.deformed_vertices
    }

    /// Armature bone index for each weight-table bone, `None` when the name did not resolve.
    pub fn mesh_bones(&self) -> &[Option<usize>] {
        &self.mesh_bones
    }

    pub fn local_matrix(&self) -> &Matrix {
        &self.local_matrix
    }

    pub fn global_transform_matrix(&self) -> &Matrix {
        &self.global_transform_matrix
    }

    /// Decomposed world transform, lazily derived after uncached updates.
    pub fn global_transform(&mut self) -> &Transform {
        if self.global_dirty {
            self.global.set_from_matrix(&self.global_transform_matrix);
            self.global_dirty = false;
        }
        &self.global
    }

    /// Pose cache entry currently backing the world transform.
    pub fn cached_pose(&self) -> Option<PoseId> {
        self.cached_pose
    }

    pub fn cached_frame_pose(&self, cache_frame_index: usize) -> Option<PoseId> {
        self.cached_frame_indices.get(&cache_frame_index).copied()
    }

    pub(crate) fn reset_cached_frames(&mut self) {
        self.cached_frame_indices.clear();
        if self.cached_pose.take().is_some() {
            self.dirty.transform = true;
        }
    }

    pub(crate) fn attach(&mut self) {
        if self.attached {
            return;
        }
        self.attached = true;
        let current = self.current_display().cloned();
        self.adapter.on_update_display(current.as_ref());
        self.adapter.add_display();
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        let current = self.current_display().cloned();
        self.adapter.on_update_display(current.as_ref());
        self.adapter.remove_display();
    }

    /// Per-frame tick. `cache_frame_index` selects the pose cache frame, `None` disables caching.
    pub fn update(&mut self, cache_frame_index: Option<usize>, ctx: &mut SlotContext<'_>) {
        if self.dirty.display {
            self.dirty.display = false;
            self.update_display(ctx);
            // A swapped display may carry a different origin.
            if self.dirty.transform {
                self.update_local_matrix();
            }
        }

        if self.dirty.z_order {
            self.dirty.z_order = false;
            self.adapter.update_z_order(self.z_order);
        }

        let parent_dirty = self
            .parent_bone(ctx.bones)
            .is_some_and(Bone::children_transform_dirty);
        match cache_frame_index {
            Some(frame) => self.resolve_cached_pose(frame, parent_dirty),
            None => {
                if self.dirty.transform || parent_dirty {
                    self.dirty.transform = true;
                    self.cached_pose = None;
                }
            }
        }

        if self.display.is_none() {
            return;
        }

        if self.dirty.visible {
            self.dirty.visible = false;
            self.adapter.update_visible(self.visible);
        }
        if self.dirty.blend_mode {
            self.dirty.blend_mode = false;
            self.adapter.update_blend_mode(self.blend_mode);
        }
        if self.dirty.color {
            self.dirty.color = false;
            self.adapter.update_color(&self.color);
        }

        if let Some(mesh) = self.mesh_data.clone() {
            if self.display == self.mesh_display {
                let skinned = mesh.is_skinned();
                if self.dirty.mesh || (skinned && self.mesh_bones_updated(ctx.bones)) {
                    self.dirty.mesh = false;
                    self.update_mesh(&mesh, ctx.bones);
                }

                // Skinned vertices are already in armature space.
                if skinned {
                    if self.dirty.transform {
                        self.dirty.transform = false;
                        self.adapter.update_transform(&TransformState {
                            matrix: &self.global_transform_matrix,
                            pivot: self.pivot,
                            skinned: true,
                        });
                    }
                    return;
                }
            }
        }

        if self.dirty.transform {
            self.dirty.transform = false;
            match self.cached_pose {
                None => {
                    self.update_global_transform_matrix(cache_frame_index.is_some(), ctx.bones);
                    if let Some(frame) = cache_frame_index {
                        let id = ctx
                            .pose_cache
                            .allocate_and_store(&self.global_transform_matrix, &self.global);
                        self.cached_pose = Some(id);
                        self.record_cached_frame(frame, Some(id));
                    }
                }
                Some(id) => {
                    if let Some(pose) = ctx.pose_cache.fetch(id) {
                        self.global_transform_matrix = pose.matrix;
                        self.global = pose.transform;
                        self.global_dirty = false;
                    } else {
                        log::warn!(
                            "slot '{}': pose {} is not in the pose cache, recomputing",
                            self.name(),
                            id.index()
                        );
                        self.cached_pose = None;
                        if let Some(frame) = cache_frame_index {
                            self.record_cached_frame(frame, None);
                        }
                        self.update_global_transform_matrix(false, ctx.bones);
                    }
                }
            }

            self.adapter.update_transform(&TransformState {
                matrix: &self.global_transform_matrix,
                pivot: self.pivot,
                skinned: false,
            });
        }
    }

    /// Recomputes the world matrix now if the transform is dirty, bypassing the pose cache.
    pub fn update_transform_and_matrix(&mut self, bones: &[Bone]) {
        if self.dirty.transform {
            self.dirty.transform = false;
            self.update_global_transform_matrix(false, bones);
        }
    }

    pub fn contains_point(&mut self, x: f32, y: f32, bones: &[Bone]) -> bool {
        let Some(data) = self.bounding_box_data.clone() else {
            return false;
        };

        self.update_transform_and_matrix(bones);
        let local = self.global_transform_matrix.invert().transform_point(x, y);
        data.bounding_box.contains_point(local.x, local.y)
    }

    /// Intersects a world-space segment with the bounding box; hits are returned in world space.
    pub fn intersects_segment(
        &mut self,
        a: Point,
        b: Point,
        bones: &[Bone],
    ) -> SegmentIntersection {
        let Some(data) = self.bounding_box_data.clone() else {
            return SegmentIntersection::MISS;
        };

        self.update_transform_and_matrix(bones);
        let inverse = self.global_transform_matrix.invert();
        let local_a = inverse.transform_point(a.x, a.y);
        let local_b = inverse.transform_point(b.x, b.y);

        let mut hit = data.bounding_box.intersects_segment(local_a, local_b);
        if hit.count <= 0 {
            return hit;
        }

        let matrix = &self.global_transform_matrix;
        if hit.count == 1 || hit.count == 2 {
            let point = matrix.transform_point(hit.point_a.x, hit.point_a.y);
            hit.point_a = point;
            hit.point_b = point;
        } else {
            hit.point_a = matrix.transform_point(hit.point_a.x, hit.point_a.y);
            hit.point_b = matrix.transform_point(hit.point_b.x, hit.point_b.y);
        }

        let (sin_a, cos_a) = hit.normal_radians.x.sin_cos();
        let (sin_b, cos_b) = hit.normal_radians.y.sin_cos();
        let normal_a = matrix.transform_vector(cos_a, sin_a);
        let normal_b = matrix.transform_vector(cos_b, sin_b);
        hit.normal_radians = Point::new(normal_a.y.atan2(normal_a.x), normal_b.y.atan2(normal_b.x));
        hit
    }

    /// Releases every display this slot owns and drops all references. Safe to call twice.
    pub fn dispose(&mut self) {
        self.detach();

        let mut released: Vec<Display<A>> = Vec::new();
        for entry in std::mem::take(&mut self.display_list).into_iter().flatten() {
            if self.is_builtin_entry(&entry) || released.contains(&entry) {
                continue;
            }
            released.push(entry);
        }
        for entry in released {
            self.dispose_entry(entry);
        }

        // The mesh placeholder may alias the raw one.
        if let Some(mesh_display) = self.mesh_display.take() {
            if self.raw_display.as_ref() != Some(&mesh_display) {
                self.adapter.dispose_display(&mesh_display);
            }
        }
        if let Some(raw_display) = self.raw_display.take() {
            self.adapter.dispose_display(&raw_display);
        }

        self.data = None;
        self.parent = None;
        self.visible = true;
        self.blend_mode = BlendMode::Normal;
        self.z_order = 0;
        self.color = ColorTransform::IDENTITY;
        self.display_index = None;
        self.animation_display_index = None;
        self.raw_display_datas = None;
        self.display_datas.clear();
        self.display = None;
        self.child_armature = None;
        self.display_data = None;
        self.texture_data = None;
        self.mesh_data = None;
        self.bounding_box_data = None;
        self.pivot = Point::ZERO;
        self.ffd_vertices.clear();
        self.deformed_vertices.clear();
        self.mesh_bones.clear();
        self.origin = None;
        self.offset = Transform::IDENTITY;
        self.local_matrix = Matrix::IDENTITY;
        self.global_transform_matrix = Matrix::IDENTITY;
        self.global = Transform::IDENTITY;
        self.global_dirty = false;
        self.cached_pose = None;
        self.cached_frame_indices.clear();
        self.dirty = SlotDirtyFlags::default();
    }

    fn current_display(&self) -> Option<&A::Display> {
        self.display.as_ref().or(self.raw_display.as_ref())
    }

    fn parent_bone<'b>(&self, bones: &'b [Bone]) -> Option<&'b Bone> {
        self.parent.and_then(|index| bones.get(index))
    }

    fn raw_display_data(&self) -> Option<&DisplayData> {
        let index = self.display_index?;
        self.raw_display_datas.as_ref()?.get(index)?.as_ref()
    }

    fn is_builtin(&self, visual: &A::Display) -> bool {
        self.raw_display.as_ref() == Some(visual) || self.mesh_display.as_ref() == Some(visual)
    }

    fn is_builtin_entry(&self, entry: &Display<A>) -> bool {
        entry.as_visual().is_some_and(|visual| self.is_builtin(visual))
    }

    fn dispose_entry(&mut self, entry: Display<A>) {
        match entry {
            Display::Visual(visual) => self.adapter.dispose_display(&visual),
            Display::Armature(child) => match child.try_borrow_mut() {
                Ok(mut child) => child.dispose(),
                Err(_) => log::warn!(
                    "slot '{}': child armature is borrowed, skipping dispose",
                    self.name()
                ),
            },
        }
    }

    fn update_display_data(&mut self, ctx: &SlotContext<'_>) {
        let prev_display_data = self.display_data.take();
        let prev_texture_data = self.texture_data.take();
        let prev_mesh_data = self.mesh_data.take();
        let raw_display_data = self.raw_display_data().cloned();

        self.display_data = self
            .display_index
            .and_then(|index| self.display_datas.get(index).cloned().flatten());

        match &self.display_data {
            Some(DisplayData::Image(image)) => {
                self.texture_data = image.texture.clone();
                if let Some(DisplayData::Mesh(mesh)) = &raw_display_data {
                    self.mesh_data = Some(Arc::clone(mesh));
                }
            }
            Some(DisplayData::Mesh(mesh)) => {
                self.texture_data = mesh.texture.clone();
                self.mesh_data = Some(Arc::clone(mesh));
            }
            Some(DisplayData::BoundingBox(_) | DisplayData::Armature(_)) | None => {}
        }

        self.bounding_box_data = match (&self.display_data, &raw_display_data) {
            (Some(DisplayData::BoundingBox(data)), _)
            | (_, Some(DisplayData::BoundingBox(data))) => Some(Arc::clone(data)),
            _ => None,
        };

        let mesh_changed = !same_arc(self.mesh_data.as_ref(), prev_mesh_data.as_ref());
        let texture_changed = !same_arc(self.texture_data.as_ref(), prev_texture_data.as_ref());
        let display_data_changed =
            !same_display_data(self.display_data.as_ref(), prev_display_data.as_ref());
        if !display_data_changed && !texture_changed && !mesh_changed {
            return;
        }

        self.pivot = self.texture_pivot(ctx.data.scale);

        if mesh_changed {
            self.rebuild_mesh_buffers(ctx.data);
        } else if self.mesh_data.is_some() && texture_changed {
            // The frame changes the UV mapping.
            self.dirty.mesh = true;
        }

        // Keep the visual anchor in place when an override has a different origin than the
        // raw display it replaces.
        if self.mesh_data.is_none() {
            if let (Some(display_data), Some(raw)) = (&self.display_data, &raw_display_data) {
                if !display_data.ptr_eq(raw) {
                    let raw_origin = raw.transform().to_matrix().invert().transform_point(0.0, 0.0);
                    let origin = display_data
                        .transform()
                        .to_matrix()
                        .invert()
                        .transform_point(0.0, 0.0);
                    self.pivot.x += origin.x - raw_origin.x;
                    self.pivot.y += origin.y - raw_origin.y;
                }
            }
        }

        if let Some(source) = raw_display_data.as_ref().or(self.display_data.as_ref()) {
            self.origin = Some(*source.transform());
        }

        self.dirty.display = true;
        self.dirty.transform = true;
    }

    fn texture_pivot(&self, armature_scale: f32) -> Point {
        if self.mesh_data.is_some() {
            return Point::ZERO;
        }
        let (Some(texture), Some(DisplayData::Image(image))) =
            (&self.texture_data, &self.display_data)
        else {
            return Point::ZERO;
        };

        let scale = texture.atlas_scale * armature_scale;
        let rect = texture.frame.unwrap_or(texture.region);
        let (mut width, mut height) = (rect.width, rect.height);
        if texture.rotated && texture.frame.is_none() {
            std::mem::swap(&mut width, &mut height);
        }

        let mut pivot = Point::new(image.pivot.x * width * scale, image.pivot.y * height * scale);
        if let Some(frame) = texture.frame {
            pivot.x += frame.x * scale;
            pivot.y += frame.y * scale;
        }
        pivot
    }

    fn rebuild_mesh_buffers(&mut self, data: &ArmatureData) {
        self.ffd_vertices.clear();
        self.deformed_vertices.clear();
        self.mesh_bones.clear();

        let Some(mesh) = self.mesh_data.clone() else {
            return;
        };

        self.ffd_vertices.resize(mesh.vertex_count() * 2, 0.0);
        if let Some(weight) = &mesh.weight {
            for name in &weight.bones {
                let index = data.bone_index(name);
                if index.is_none() {
                    log::warn!(
                        "slot '{}': mesh '{}' is weighted to unknown bone '{}'",
                        self.name(),
                        mesh.name,
                        name
                    );
                }
                self.mesh_bones.push(index);
            }
        }
        self.dirty.mesh = true;
    }

    fn update_display(&mut self, ctx: &SlotContext<'_>) {
        let prev_display = self.current_display().cloned();
        let prev_child_armature = self.child_armature.take();

        let selected = self
            .display_index
            .and_then(|index| self.display_list.get(index))
            .cloned()
            .flatten();
        self.display = match selected {
            Some(Display::Visual(visual)) => Some(visual),
            Some(Display::Armature(child)) => {
                let root = match child.try_borrow() {
                    Ok(child) => child.display().cloned(),
                    Err(_) => {
                        log::warn!("slot '{}': child armature is borrowed", self.name());
                        None
                    }
                };
                self.child_armature = Some(child);
                root
            }
            None => None,
        };

        let current = self.current_display().cloned();
        if current != prev_display {
            self.adapter.on_update_display(current.as_ref());
            self.adapter.replace_display(prev_display.as_ref());
            self.dirty.visible = true;
            self.dirty.blend_mode = true;
            self.dirty.color = true;
        }

        // Placeholders are reused across display data and must be re-framed explicitly.
        if current.is_some() && (current == self.raw_display || current == self.mesh_display) {
            self.update_frame();
        }

        let child_changed = match (&prev_child_armature, &self.child_armature) {
            (Some(prev), Some(current)) => !Rc::ptr_eq(prev, current),
            (None, None) => false,
            _ => true,
        };
        if child_changed {
            if let Some(prev) = prev_child_armature {
                self.release_child_armature(&prev);
            }
            if let Some(child) = self.child_armature.clone() {
                self.adopt_child_armature(&child, ctx);
            }
        }
    }

    fn update_frame(&mut self) {
        let mesh = if self.display.is_some() && self.display == self.mesh_display {
            self.mesh_data.as_deref()
        } else {
            None
        };
        self.adapter.update_frame(&FrameState {
            display_data: self.display_data.as_ref(),
            texture: self.texture_data.as_ref(),
            mesh,
            pivot: self.pivot,
        });
    }

    fn release_child_armature(&self, child: &ChildArmature<A>) {
        let Ok(mut child) = child.try_borrow_mut() else {
            log::warn!("slot '{}': cannot detach borrowed child armature", self.name());
            return;
        };
        child.set_parent_slot(None);
        child.set_clock(None);
        if child.inherit_animation() {
            child.animation_mut().reset();
        }
    }

    fn adopt_child_armature(&self, child: &ChildArmature<A>, ctx: &SlotContext<'_>) {
        let Ok(mut child) = child.try_borrow_mut() else {
            log::warn!("slot '{}': cannot attach borrowed child armature", self.name());
            return;
        };
        child.set_parent_slot(Some(self.name().to_owned()));
        child.set_clock(ctx.clock);
        if !child.inherit_animation() {
            return;
        }

        if child.cache_frame_rate() == 0 && ctx.cache_frame_rate != 0 {
            child.set_cache_frame_rate(ctx.cache_frame_rate);
        }

        let actions = self.child_armature_actions();
        if actions.is_empty() {
            child.animation_mut().play();
        } else {
            for action in actions {
                child.animation_mut().buffer_action(action.clone());
            }
        }
    }

    fn child_armature_actions(&self) -> &[ActionData] {
        if let Some(DisplayData::Armature(data)) = &self.display_data {
            return &data.actions;
        }
        if let Some(DisplayData::Armature(data)) = self.raw_display_data() {
            return &data.actions;
        }
        &[]
    }

    fn resolve_cached_pose(&mut self, frame: usize, parent_dirty: bool) {
        match self.cached_frame_pose(frame) {
            Some(id) if self.cached_pose == Some(id) => {
                self.dirty.transform = false;
            }
            Some(id) => {
                // Computed by another pass; fetch it.
                self.dirty.transform = true;
                self.cached_pose = Some(id);
            }
            None if self.dirty.transform || parent_dirty => {
                self.dirty.transform = true;
                self.cached_pose = None;
            }
            None => match self.cached_pose {
                Some(id) => {
                    self.dirty.transform = false;
                    self.record_cached_frame(frame, Some(id));
                }
                None => self.dirty.transform = true,
            },
        }
    }

    fn record_cached_frame(&mut self, frame: usize, id: Option<PoseId>) {
        match id {
            Some(id) => self.cached_frame_indices.insert(frame, id),
            None => self.cached_frame_indices.remove(&frame),
        };
    }

    fn update_local_matrix(&mut self) {
        let local = match self.origin {
            Some(origin) => origin + self.offset,
            None => self.offset,
        };
        self.local_matrix = local.to_matrix();
    }

    fn update_global_transform_matrix(&mut self, is_cache: bool, bones: &[Bone]) {
        let parent = self
            .parent_bone(bones)
            .map_or(Matrix::IDENTITY, |bone| *bone.global_transform_matrix());
        self.global_transform_matrix = self.local_matrix.concat(&parent);
        if is_cache {
            self.global.set_from_matrix(&self.global_transform_matrix);
            self.global_dirty = false;
        } else {
            self.global_dirty = true;
        }
    }

    fn mesh_bones_updated(&self, bones: &[Bone]) -> bool {
        self.mesh_bones
            .iter()
            .flatten()
            .any(|&index| bones.get(index).is_some_and(Bone::children_transform_dirty))
    }

    fn update_mesh(&mut self, mesh: &MeshDisplayData, bones: &[Bone]) {
        debug_assert_eq!(self.ffd_vertices.len(), mesh.vertex_count() * 2);

        self.deformed_vertices.clear();
        self.deformed_vertices.reserve(mesh.vertex_count() * 2);
        let offset = |ffd: &[f32], vertex: usize| -> (f32, f32) {
            (
                ffd.get(vertex * 2).copied().unwrap_or(0.0),
                ffd.get(vertex * 2 + 1).copied().unwrap_or(0.0),
            )
        };

        match &mesh.weight {
            Some(weight) => {
                for (vertex, influences) in weight.vertices.iter().enumerate() {
                    let (dx, dy) = offset(&self.ffd_vertices, vertex);
                    let mut x = 0.0;
                    let mut y = 0.0;
                    for influence in influences {
                        let Some(bone) = self
                            .mesh_bones
                            .get(influence.bone)
                            .copied()
                            .flatten()
                            .and_then(|index| bones.get(index))
                        else {
                            continue;
                        };
                        let p = bone
                            .global_transform_matrix()
                            .transform_point(influence.x + dx, influence.y + dy);
                        x += p.x * influence.weight;
                        y += p.y * influence.weight;
                    }
                    self.deformed_vertices.push(x);
                    self.deformed_vertices.push(y);
                }
            }
            None => {
                for (vertex, position) in mesh.vertices.iter().enumerate() {
                    let (dx, dy) = offset(&self.ffd_vertices, vertex);
                    self.deformed_vertices.push(position[0] + dx);
                    self.deformed_vertices.push(position[1] + dy);
                }
            }
        }

        self.adapter.update_mesh(&MeshState {
            mesh,
            vertices: &self.deformed_vertices,
            skinned: mesh.is_skinned(),
        });
    }
}
