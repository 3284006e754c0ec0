use crate::{BoundingBox, Error, Point, Transform};
use std::collections::HashMap;
use std::sync::Arc;

/// Catalogue of display variants for one slot, indexed by display index.
pub type DisplayDataList = Arc<Vec<Option<DisplayData>>>;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneData {
    pub name: String,
    /// Index of the parent in `ArmatureData::bones`; always smaller than this bone's index.
    pub parent: Option<usize>,
    pub length: f32,
    pub transform: Transform,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Alpha,
    Darken,
    Difference,
    Erase,
    HardLight,
    Invert,
    Layer,
    Lighten,
    Multiply,
    Overlay,
    Screen,
    Subtract,
}

/// Tint as per-channel multipliers plus integer offsets in `0..=255` space.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColorTransform {
    pub alpha_multiplier: f32,
    pub red_multiplier: f32,
    pub green_multiplier: f32,
    pub blue_multiplier: f32,
    pub alpha_offset: i32,
    pub red_offset: i32,
    pub green_offset: i32,
    pub blue_offset: i32,
}

impl ColorTransform {
    pub const IDENTITY: Self = Self {
        alpha_multiplier: 1.0,
        red_multiplier: 1.0,
        green_multiplier: 1.0,
        blue_multiplier: 1.0,
        alpha_offset: 0,
        red_offset: 0,
        green_offset: 0,
        blue_offset: 0,
    };
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    /// Display selected at build time; `None` shows nothing.
    pub display_index: Option<usize>,
    pub z_order: i32,
    pub blend_mode: BlendMode,
    pub color: ColorTransform,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One packed texture region.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub name: String,
    /// Packing scale of the owning atlas.
    pub atlas_scale: f32,
    pub rotated: bool,
    pub region: Rectangle,
    /// Untrimmed frame; `x`/`y` are the (usually negative) trim offsets.
    pub frame: Option<Rectangle>,
}

#[derive(Clone, Debug)]
pub struct ImageDisplayData {
    pub name: String,
    pub transform: Transform,
    /// Normalized pivot, `(0.5, 0.5)` is the centre of the texture frame.
    pub pivot: Point,
    pub texture: Option<Arc<TextureData>>,
}

#[derive(Clone, Debug)]
pub struct VertexWeight {
    /// Index into [`WeightData::bones`].
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

/// Per-vertex bone influences of a skinned mesh.
#[derive(Clone, Debug)]
pub struct WeightData {
    /// Names of the influencing bones, resolved against the armature on display swap.
    pub bones: Vec<String>,
    /// Influences of each vertex, in bind space of the influencing bone.
    pub vertices: Vec<Vec<VertexWeight>>,
}

#[derive(Clone, Debug)]
pub struct MeshDisplayData {
    pub name: String,
    pub transform: Transform,
    pub texture: Option<Arc<TextureData>>,
    /// Bind positions in slot space. Unused when `weight` is set.
    pub vertices: Vec<[f32; 2]>,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
    pub weight: Option<WeightData>,
}

impl MeshDisplayData {
    pub fn vertex_count(&self) -> usize {
        match &self.weight {
            Some(weight) => weight.vertices.len(),
            None => self.vertices.len(),
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.weight.is_some()
    }

    fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Error::InvalidMeshData {
            display: self.name.clone(),
            message,
        };

        if !self.uvs.is_empty() && self.uvs.len() != self.vertex_count() {
            return Err(invalid(format!(
                "{} uvs for {} vertices",
                self.uvs.len(),
                self.vertex_count()
            )));
        }
        if let Some(index) = self
            .triangles
            .iter()
            .find(|&&index| usize::from(index) >= self.vertex_count())
        {
            return Err(invalid(format!("triangle index {index} out of range")));
        }
        if let Some(weight) = &self.weight {
            for influences in &weight.vertices {
                for influence in influences {
                    if influence.bone >= weight.bones.len() {
                        return Err(invalid(format!(
                            "weight bone index {} out of range ({} bones)",
                            influence.bone,
                            weight.bones.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct BoundingBoxDisplayData {
    pub name: String,
    pub transform: Transform,
    pub bounding_box: BoundingBox,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    Play,
    Stop,
    GotoAndPlay,
    GotoAndStop,
    FadeIn,
}

/// Entry action dispatched to a nested armature when it becomes visible.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionData {
    pub kind: ActionKind,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct ArmatureDisplayData {
    pub name: String,
    pub transform: Transform,
    /// Name of the nested armature definition.
    pub path: String,
    pub inherit_animation: bool,
    pub actions: Vec<ActionData>,
}

/// One catalogue entry. Cloning is cheap; identity is the shared allocation.
#[derive(Clone, Debug)]
pub enum DisplayData {
    Image(Arc<ImageDisplayData>),
    Mesh(Arc<MeshDisplayData>),
    BoundingBox(Arc<BoundingBoxDisplayData>),
    Armature(Arc<ArmatureDisplayData>),
}

impl DisplayData {
    pub fn name(&self) -> &str {
        match self {
            DisplayData::Image(d) => d.name.as_str(),
            DisplayData::Mesh(d) => d.name.as_str(),
            DisplayData::BoundingBox(d) => d.name.as_str(),
            DisplayData::Armature(d) => d.name.as_str(),
        }
    }

    pub fn transform(&self) -> &Transform {
        match self {
            DisplayData::Image(d) => &d.transform,
            DisplayData::Mesh(d) => &d.transform,
            DisplayData::BoundingBox(d) => &d.transform,
            DisplayData::Armature(d) => &d.transform,
        }
    }

    pub fn texture(&self) -> Option<&Arc<TextureData>> {
        match self {
            DisplayData::Image(d) => d.texture.as_ref(),
            DisplayData::Mesh(d) => d.texture.as_ref(),
            DisplayData::BoundingBox(_) | DisplayData::Armature(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &DisplayData) -> bool {
        match (self, other) {
            (DisplayData::Image(a), DisplayData::Image(b)) => Arc::ptr_eq(a, b),
            (DisplayData::Mesh(a), DisplayData::Mesh(b)) => Arc::ptr_eq(a, b),
            (DisplayData::BoundingBox(a), DisplayData::BoundingBox(b)) => Arc::ptr_eq(a, b),
            (DisplayData::Armature(a), DisplayData::Armature(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub(crate) fn same_arc<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub(crate) fn same_display_data(a: Option<&DisplayData>, b: Option<&DisplayData>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkinData {
    pub name: String,
    /// Display catalogue per slot name.
    pub displays: HashMap<String, DisplayDataList>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            displays: HashMap::new(),
        }
    }

    pub fn with_displays(
        mut self,
        slot_name: impl Into<String>,
        displays: Vec<Option<DisplayData>>,
    ) -> Self {
        self.displays.insert(slot_name.into(), Arc::new(displays));
        self
    }

    pub fn slot_displays(&self, slot_name: &str) -> Option<&DisplayDataList> {
        self.displays.get(slot_name)
    }
}

#[derive(Clone, Debug)]
pub struct ArmatureData {
    pub name: String,
    /// Global scale applied to texture-space pivots.
    pub scale: f32,
    /// Frame rate used for pose caching, `0` disables it.
    pub cache_frame_rate: u32,
    pub bones: Vec<BoneData>,
    pub slots: Vec<Arc<SlotData>>,
    pub skins: HashMap<String, SkinData>,
    bone_index: HashMap<String, usize>,
    slot_index: HashMap<String, usize>,
}

impl ArmatureData {
    pub fn new(
        name: impl Into<String>,
        bones: Vec<BoneData>,
        slots: Vec<SlotData>,
        skins: Vec<SkinData>,
    ) -> Result<Self, Error> {
        let mut bone_index = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(Error::InvalidBoneParent {
                        bone: bone.name.clone(),
                        parent,
                    });
                }
            }
            if bone_index.insert(bone.name.clone(), index).is_some() {
                return Err(Error::DuplicateBone {
                    name: bone.name.clone(),
                });
            }
        }

        let mut slot_index = HashMap::with_capacity(slots.len());
        for (index, slot) in slots.iter().enumerate() {
            if slot.bone >= bones.len() {
                return Err(Error::UnknownSlotBone {
                    slot: slot.name.clone(),
                    bone: slot.bone,
                });
            }
            if slot_index.insert(slot.name.clone(), index).is_some() {
                return Err(Error::DuplicateSlot {
                    name: slot.name.clone(),
                });
            }
        }

        let mut skin_map = HashMap::with_capacity(skins.len());
        for skin in skins {
            for (slot_name, displays) in &skin.displays {
                if !slot_index.contains_key(slot_name) {
                    return Err(Error::UnknownSkinSlot {
                        skin: skin.name.clone(),
                        slot: slot_name.clone(),
                    });
                }
                for display in displays.iter().flatten() {
                    if let DisplayData::Mesh(mesh) = display {
                        mesh.validate()?;
                    }
                }
            }
            skin_map.insert(skin.name.clone(), skin);
        }

        Ok(Self {
            name: name.into(),
            scale: 1.0,
            cache_frame_rate: 0,
            bones,
            slots: slots.into_iter().map(Arc::new).collect(),
            skins: skin_map,
            bone_index,
            slot_index,
        })
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_index.get(name).copied()
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slot_index.get(name).copied()
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.get(name)
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.skins.get("default")
    }
}
