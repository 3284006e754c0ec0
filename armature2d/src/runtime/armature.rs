use crate::{
    ActionData, ArmatureData, Bone, Display, DisplayAdapter, DisplayData, DisplayFactory, Error,
    Point, PoseCache, SegmentIntersection, Slot, SlotContext,
};
use std::fmt;
use std::sync::Arc;

/// Identifies the clock a (child) armature is advanced by.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClockId(pub u32);

/// Minimal playback handle of an armature: whether it runs, plus entry actions queued for
/// the animation system to consume.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playback {
    playing: bool,
    buffered_actions: Vec<ActionData>,
}

impl Playback {
    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn reset(&mut self) {
        self.playing = false;
        self.buffered_actions.clear();
    }

    pub fn buffer_action(&mut self, action: ActionData) {
        self.buffered_actions.push(action);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn buffered_actions(&self) -> &[ActionData] {
        &self.buffered_actions
    }

    pub fn take_buffered_actions(&mut self) -> Vec<ActionData> {
        std::mem::take(&mut self.buffered_actions)
    }
}

/// Runtime instance of an [`ArmatureData`]: bones, slots and the pose cache they share.
pub struct Armature<A: DisplayAdapter> {
    data: Arc<ArmatureData>,
    bones: Vec<Bone>,
    slots: Vec<Slot<A>>,
    pose_cache: PoseCache,
    display: Option<A::Display>,
    parent_slot: Option<String>,
    clock: Option<ClockId>,
    inherit_animation: bool,
    cache_frame_rate: u32,
    animation: Playback,
    disposed: bool,
}

impl<A: DisplayAdapter> fmt::Debug for Armature<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Armature")
            .field("name", &self.data.name)
            .field("bones", &self.bones.len())
            .field("slots", &self.slots)
            .field("parent_slot", &self.parent_slot)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl<A: DisplayAdapter> Armature<A> {
    /// Instantiates `data` with the named skin, or the `"default"` skin when `skin_name` is
    /// `None`. A missing default skin yields empty display lists.
    pub fn build<F>(
        data: Arc<ArmatureData>,
        skin_name: Option<&str>,
        factory: &mut F,
    ) -> Result<Self, Error>
    where
        F: DisplayFactory<Adapter = A>,
    {
        let skin = match skin_name {
            Some(name) => Some(data.skin(name).ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?),
            None => data.default_skin(),
        };

        let mut armature = Self {
            data: Arc::clone(&data),
            bones: data
                .bones
                .iter()
                .enumerate()
                .map(|(index, bone)| Bone::new(index, bone))
                .collect(),
            slots: Vec::with_capacity(data.slots.len()),
            pose_cache: PoseCache::new(),
            display: factory.create_armature_display(&data),
            parent_slot: None,
            clock: None,
            inherit_animation: true,
            cache_frame_rate: data.cache_frame_rate,
            animation: Playback::default(),
            disposed: false,
        };

        for slot_data in &data.slots {
            let adapter = factory.create_adapter(&data, slot_data);
            let raw_display = factory.create_raw_display(slot_data);
            let mesh_display = factory.create_mesh_display(slot_data);
            let displays = skin
                .and_then(|skin| skin.slot_displays(&slot_data.name))
                .cloned();

            let mut display_list: Vec<Option<Display<A>>> = Vec::new();
            for entry in displays.iter().flat_map(|displays| displays.iter()) {
                display_list.push(match entry {
                    Some(DisplayData::Image(_)) => Some(Display::Visual(raw_display.clone())),
                    Some(DisplayData::Mesh(_)) => Some(Display::Visual(mesh_display.clone())),
                    Some(DisplayData::Armature(child_data)) => {
                        let child = factory.build_child_armature(child_data);
                        if let Some(child) = &child {
                            match child.try_borrow_mut() {
                                Ok(mut child) => {
                                    child.set_inherit_animation(child_data.inherit_animation);
                                }
                                Err(_) => log::warn!(
                                    "armature '{}': child armature '{}' is borrowed",
                                    data.name,
                                    child_data.path
                                ),
                            }
                        }
                        child.map(Display::Armature)
                    }
                    Some(DisplayData::BoundingBox(_)) | None => None,
                });
            }

            let mut slot = Slot::new(adapter);
            slot.init(Arc::clone(slot_data), displays, raw_display, mesh_display);

            let (slots, ctx) = armature.split_slots();
            slot.replace_display_list(display_list, &ctx);
            slot.apply_animation_display_index(slot_data.display_index, &ctx);
            slot.attach();
            slots.push(slot);
        }

        log::debug!(
            "armature '{}': built {} bones, {} slots (skin {:?})",
            data.name,
            armature.bones.len(),
            armature.slots.len(),
            skin.map(|skin| skin.name.as_str())
        );
        Ok(armature)
    }

    pub fn data(&self) -> &Arc<ArmatureData> {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Root visual used when this armature is nested inside a slot.
    pub fn display(&self) -> Option<&A::Display> {
        self.display.as_ref()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.data
            .bone_index(name)
            .and_then(|index| self.bones.get(index))
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.data
            .bone_index(name)
            .and_then(|index| self.bones.get_mut(index))
    }

    pub fn slots(&self) -> &[Slot<A>] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot<A>> {
        self.data
            .slot_index(name)
            .and_then(|index| self.slots.get(index))
    }

    /// Direct slot access for operations that do not need armature state.
    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot<A>> {
        self.data
            .slot_index(name)
            .and_then(|index| self.slots.get_mut(index))
    }

    /// Runs `f` on the named slot together with the armature state it updates against.
    pub fn with_slot<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Slot<A>, &mut SlotContext<'_>) -> R,
    ) -> Option<R> {
        let index = self.data.slot_index(name)?;
        let (slots, mut ctx) = self.split_slots();
        let slot = slots.get_mut(index)?;
        Some(f(slot, &mut ctx))
    }

    pub fn pose_cache(&self) -> &PoseCache {
        &self.pose_cache
    }

    pub fn parent_slot(&self) -> Option<&str> {
        self.parent_slot.as_deref()
    }

    pub(crate) fn set_parent_slot(&mut self, parent_slot: Option<String>) {
        self.parent_slot = parent_slot;
    }

    pub fn clock(&self) -> Option<ClockId> {
        self.clock
    }

    pub fn set_clock(&mut self, clock: Option<ClockId>) {
        self.clock = clock;
    }

    /// Whether this armature follows the animation of the slot it is nested in.
    pub fn inherit_animation(&self) -> bool {
        self.inherit_animation
    }

    pub fn set_inherit_animation(&mut self, inherit_animation: bool) {
        self.inherit_animation = inherit_animation;
    }

    pub fn cache_frame_rate(&self) -> u32 {
        self.cache_frame_rate
    }

    /// Changing the rate invalidates every cached pose.
    pub fn set_cache_frame_rate(&mut self, cache_frame_rate: u32) {
        if self.cache_frame_rate != cache_frame_rate {
            self.cache_frame_rate = cache_frame_rate;
            self.clear_pose_cache();
        }
    }

    pub fn animation(&self) -> &Playback {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut Playback {
        &mut self.animation
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Updates bones parent-first, then every slot in order. `cache_frame_index` is ignored
    /// while the cache frame rate is `0`.
    pub fn update(&mut self, cache_frame_index: Option<usize>) {
        if self.disposed {
            return;
        }

        for index in 0..self.bones.len() {
            let (ancestors, rest) = self.bones.split_at_mut(index);
            let bone = &mut rest[0];
            let parent = bone.parent_index().and_then(|parent| ancestors.get(parent));
            bone.update(parent);
        }

        let cache_frame_index = cache_frame_index.filter(|_| self.cache_frame_rate != 0);
        let (slots, mut ctx) = self.split_slots();
        for slot in slots.iter_mut() {
            slot.update(cache_frame_index, &mut ctx);
        }
    }

    /// Marks the named bone (or every bone) dirty and invalidates every slot.
    pub fn invalidate_update(&mut self, bone_name: Option<&str>) {
        match bone_name {
            Some(name) => match self.bone_mut(name) {
                Some(bone) => bone.invalidate_update(),
                None => log::warn!(
                    "armature '{}': cannot invalidate unknown bone '{}'",
                    self.data.name,
                    name
                ),
            },
            None => self.bones.iter_mut().for_each(Bone::invalidate_update),
        }

        for slot in &mut self.slots {
            slot.invalid_update();
        }
    }

    pub fn clear_pose_cache(&mut self) {
        self.pose_cache.clear();
        for slot in &mut self.slots {
            slot.reset_cached_frames();
        }
    }

    /// Name of the first slot whose bounding box contains the world point.
    pub fn contains_point(&mut self, x: f32, y: f32) -> Option<&str> {
        let bones = &self.bones;
        let index = self
            .slots
            .iter_mut()
            .position(|slot| slot.contains_point(x, y, bones))?;
        Some(self.slots[index].name())
    }

    /// First slot whose bounding box the world segment touches or lies within.
    pub fn intersects_segment(
        &mut self,
        a: Point,
        b: Point,
    ) -> Option<(&str, SegmentIntersection)> {
        let bones = &self.bones;
        let (index, hit) = self.slots.iter_mut().enumerate().find_map(|(index, slot)| {
            let hit = slot.intersects_segment(a, b, bones);
            (hit.count != 0).then_some((index, hit))
        })?;
        Some((self.slots[index].name(), hit))
    }

    /// Slot indices in drawing order, stable for equal z-order.
    pub fn draw_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by_key(|&index| self.slots[index].z_order());
        order
    }

    /// Tears down every slot and drops the instance state. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        log::debug!(
            "armature '{}': disposing {} slots",
            self.data.name,
            self.slots.len()
        );
        for slot in &mut self.slots {
            slot.dispose();
        }
        self.slots.clear();
        self.bones.clear();
        self.pose_cache.clear();
        self.display = None;
        self.parent_slot = None;
        self.clock = None;
        self.animation.reset();
    }

    fn split_slots(&mut self) -> (&mut Vec<Slot<A>>, SlotContext<'_>) {
        let Self {
            ref data,
            ref bones,
            ref mut slots,
            ref mut pose_cache,
            clock,
            cache_frame_rate,
            ..
        } = *self;
        (
            slots,
            SlotContext {
                data: &**data,
                bones,
                pose_cache,
                clock,
                cache_frame_rate,
            },
        )
    }
}
