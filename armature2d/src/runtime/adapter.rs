//! Contract between the slot pipeline and an engine-specific renderer.
//!
//! The pipeline decides *when* something changed; a [`DisplayAdapter`] decides what that means
//! for its rendering target. Each slot owns one adapter instance.

use crate::{
    Armature, ArmatureData, ArmatureDisplayData, BlendMode, ColorTransform, DisplayData, Matrix,
    MeshDisplayData, Point, SlotData, TextureData,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Shared handle to a nested armature shown by a slot.
pub type ChildArmature<A> = Rc<RefCell<Armature<A>>>;

/// Display list entry: a renderable handle or a nested armature.
pub enum Display<A: DisplayAdapter> {
    Visual(A::Display),
    Armature(ChildArmature<A>),
}

impl<A: DisplayAdapter> Display<A> {
    pub fn as_visual(&self) -> Option<&A::Display> {
        match self {
            Display::Visual(visual) => Some(visual),
            Display::Armature(_) => None,
        }
    }

    pub fn as_armature(&self) -> Option<&ChildArmature<A>> {
        match self {
            Display::Visual(_) => None,
            Display::Armature(armature) => Some(armature),
        }
    }
}

impl<A: DisplayAdapter> Clone for Display<A> {
    fn clone(&self) -> Self {
        match self {
            Display::Visual(visual) => Display::Visual(visual.clone()),
            Display::Armature(armature) => Display::Armature(Rc::clone(armature)),
        }
    }
}

impl<A: DisplayAdapter> PartialEq for Display<A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Display::Visual(a), Display::Visual(b)) => a == b,
            (Display::Armature(a), Display::Armature(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<A: DisplayAdapter> fmt::Debug for Display<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Display::Visual(visual) => f.debug_tuple("Visual").field(visual).finish(),
            Display::Armature(armature) => f
                .debug_tuple("Armature")
                .field(&Rc::as_ptr(armature))
                .finish(),
        }
    }
}

/// Inputs for re-framing the active display (texture, UVs, pivot).
#[derive(Copy, Clone, Debug)]
pub struct FrameState<'a> {
    pub display_data: Option<&'a DisplayData>,
    pub texture: Option<&'a Arc<TextureData>>,
    /// Set only while the mesh placeholder is the active display.
    pub mesh: Option<&'a MeshDisplayData>,
    pub pivot: Point,
}

/// Freshly deformed mesh vertices, flat `[x0, y0, x1, y1, ..]`.
///
/// Skinned meshes are already in armature space; rigid meshes are in slot space.
#[derive(Copy, Clone, Debug)]
pub struct MeshState<'a> {
    pub mesh: &'a MeshDisplayData,
    pub vertices: &'a [f32],
    pub skinned: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct TransformState<'a> {
    pub matrix: &'a Matrix,
    pub pivot: Point,
    /// Skinned mesh vertices already carry the world transform.
    pub skinned: bool,
}

/// Rendering-side notifications issued by a slot.
pub trait DisplayAdapter {
    /// Renderable handle. Equality is handle identity.
    type Display: Clone + PartialEq + fmt::Debug;

    /// A display entered the display list for the first time.
    fn init_display(&mut self, display: &Self::Display);
    /// A display left the display list and is not referenced anywhere else.
    fn dispose_display(&mut self, display: &Self::Display);
    /// The renderable the adapter drives is now `current`.
    fn on_update_display(&mut self, current: Option<&Self::Display>);
    /// The slot joined an armature.
    fn add_display(&mut self);
    /// `previous` was swapped out for the current renderable.
    fn replace_display(&mut self, previous: Option<&Self::Display>);
    /// The slot left its armature.
    fn remove_display(&mut self);
    fn update_z_order(&mut self, z_order: i32);
    fn update_visible(&mut self, visible: bool);
    fn update_blend_mode(&mut self, blend_mode: BlendMode);
    fn update_color(&mut self, color: &ColorTransform);
    fn update_frame(&mut self, frame: &FrameState<'_>);
    fn update_mesh(&mut self, mesh: &MeshState<'_>);
    fn update_transform(&mut self, transform: &TransformState<'_>);
}

/// Engine hook used by [`Armature::build`] to create per-slot rendering state.
pub trait DisplayFactory {
    type Adapter: DisplayAdapter;

    fn create_adapter(&mut self, armature: &ArmatureData, slot: &SlotData) -> Self::Adapter;

    fn create_raw_display(
        &mut self,
        slot: &SlotData,
    ) -> <Self::Adapter as DisplayAdapter>::Display;

    /// Placeholder reused for mesh displays. May return the raw placeholder again.
    fn create_mesh_display(
        &mut self,
        slot: &SlotData,
    ) -> <Self::Adapter as DisplayAdapter>::Display;

    /// Root visual of an armature, used when it is nested inside another slot.
    fn create_armature_display(
        &mut self,
        armature: &ArmatureData,
    ) -> Option<<Self::Adapter as DisplayAdapter>::Display>;

    fn build_child_armature(
        &mut self,
        _display: &ArmatureDisplayData,
    ) -> Option<ChildArmature<Self::Adapter>> {
        None
    }
}
