//! Recording adapter and small data builders shared by the runtime tests.

use crate::{
    Armature, ArmatureData, ArmatureDisplayData, BlendMode, BoneData, BoundingBox,
    BoundingBoxDisplayData, ChildArmature, ColorTransform, DisplayAdapter, DisplayData,
    DisplayFactory, FrameState, ImageDisplayData, Matrix, MeshDisplayData, MeshState, Point,
    Rectangle, SlotData, TextureData, Transform, TransformState, VertexWeight, WeightData,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Event {
    Init(u32),
    Dispose(u32),
    OnUpdateDisplay(Option<u32>),
    Add,
    Replace(Option<u32>),
    Remove,
    ZOrder(i32),
    Visible(bool),
    BlendMode(BlendMode),
    Color(ColorTransform),
    Frame {
        display: Option<String>,
        texture: Option<String>,
        mesh: bool,
        pivot: Point,
    },
    Mesh {
        vertices: Vec<f32>,
        skinned: bool,
    },
    Transform {
        matrix: Matrix,
        skinned: bool,
    },
}

pub(crate) type EventLog = Rc<RefCell<Vec<(String, Event)>>>;

/// Adapter over `u32` handles that records every notification, tagged with the slot name.
#[derive(Debug)]
pub(crate) struct RecordingAdapter {
    slot: String,
    log: EventLog,
}

impl RecordingAdapter {
    fn record(&self, event: Event) {
        self.log.borrow_mut().push((self.slot.clone(), event));
    }
}

impl DisplayAdapter for RecordingAdapter {
    type Display = u32;

    fn init_display(&mut self, display: &u32) {
        self.record(Event::Init(*display));
    }

    fn dispose_display(&mut self, display: &u32) {
        self.record(Event::Dispose(*display));
    }

    fn on_update_display(&mut self, current: Option<&u32>) {
        self.record(Event::OnUpdateDisplay(current.copied()));
    }

    fn add_display(&mut self) {
        self.record(Event::Add);
    }

    fn replace_display(&mut self, previous: Option<&u32>) {
        self.record(Event::Replace(previous.copied()));
    }

    fn remove_display(&mut self) {
        self.record(Event::Remove);
    }

    fn update_z_order(&mut self, z_order: i32) {
        self.record(Event::ZOrder(z_order));
    }

    fn update_visible(&mut self, visible: bool) {
        self.record(Event::Visible(visible));
    }

    fn update_blend_mode(&mut self, blend_mode: BlendMode) {
        self.record(Event::BlendMode(blend_mode));
    }

    fn update_color(&mut self, color: &ColorTransform) {
        self.record(Event::Color(*color));
    }

    fn update_frame(&mut self, frame: &FrameState<'_>) {
        self.record(Event::Frame {
            display: frame.display_data.map(|data| data.name().to_string()),
            texture: frame.texture.map(|texture| texture.name.clone()),
            mesh: frame.mesh.is_some(),
            pivot: frame.pivot,
        });
    }

    fn update_mesh(&mut self, mesh: &MeshState<'_>) {
        self.record(Event::Mesh {
            vertices: mesh.vertices.to_vec(),
            skinned: mesh.skinned,
        });
    }

    fn update_transform(&mut self, transform: &TransformState<'_>) {
        self.record(Event::Transform {
            matrix: *transform.matrix,
            skinned: transform.skinned,
        });
    }
}

/// Hands out sequential display handles. Raw placeholders of slot `n` are `100 * (n + 1)`,
/// mesh placeholders `100 * (n + 1) + 1` unless `shared_mesh_placeholder` is set.
#[derive(Default)]
pub(crate) struct TestFactory {
    pub log: EventLog,
    pub shared_mesh_placeholder: bool,
    pub children: HashMap<String, ChildArmature<RecordingAdapter>>,
    slot_count: u32,
    armature_count: u32,
}

impl TestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self, slot: &str) -> Vec<Event> {
        self.log
            .borrow()
            .iter()
            .filter(|(name, _)| name == slot)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self, slot: &str, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events(slot).iter().filter(|event| predicate(event)).count()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl DisplayFactory for TestFactory {
    type Adapter = RecordingAdapter;

    fn create_adapter(&mut self, _armature: &ArmatureData, slot: &SlotData) -> RecordingAdapter {
        self.slot_count += 1;
        RecordingAdapter {
            slot: slot.name.clone(),
            log: Rc::clone(&self.log),
        }
    }

    fn create_raw_display(&mut self, _slot: &SlotData) -> u32 {
        self.slot_count * 100
    }

    fn create_mesh_display(&mut self, _slot: &SlotData) -> u32 {
        if self.shared_mesh_placeholder {
            self.slot_count * 100
        } else {
            self.slot_count * 100 + 1
        }
    }

    fn create_armature_display(&mut self, _armature: &ArmatureData) -> Option<u32> {
        self.armature_count += 1;
        Some(10_000 + self.armature_count)
    }

    fn build_child_armature(
        &mut self,
        display: &ArmatureDisplayData,
    ) -> Option<ChildArmature<RecordingAdapter>> {
        self.children.get(&display.path).cloned()
    }
}

pub(crate) fn build(data: ArmatureData, factory: &mut TestFactory) -> Armature<RecordingAdapter> {
    Armature::build(Arc::new(data), None, factory).expect("build armature")
}

pub(crate) fn bone(name: &str, parent: Option<usize>, transform: Transform) -> BoneData {
    BoneData {
        name: name.to_string(),
        parent,
        length: 0.0,
        transform,
    }
}

pub(crate) fn slot(name: &str, bone: usize, display_index: Option<usize>) -> SlotData {
    SlotData {
        name: name.to_string(),
        bone,
        display_index,
        z_order: 0,
        blend_mode: BlendMode::Normal,
        color: ColorTransform::IDENTITY,
    }
}

pub(crate) fn texture(name: &str, width: f32, height: f32) -> Arc<TextureData> {
    Arc::new(TextureData {
        name: name.to_string(),
        atlas_scale: 1.0,
        rotated: false,
        region: Rectangle {
            x: 0.0,
            y: 0.0,
            width,
            height,
        },
        frame: None,
    })
}

pub(crate) fn image(
    name: &str,
    transform: Transform,
    pivot: Point,
    texture: Option<Arc<TextureData>>,
) -> DisplayData {
    DisplayData::Image(Arc::new(ImageDisplayData {
        name: name.to_string(),
        transform,
        pivot,
        texture,
    }))
}

pub(crate) fn rigid_mesh(name: &str, vertices: Vec<[f32; 2]>) -> DisplayData {
    DisplayData::Mesh(Arc::new(MeshDisplayData {
        name: name.to_string(),
        transform: Transform::IDENTITY,
        texture: Some(texture(name, 32.0, 32.0)),
        uvs: vec![[0.0, 0.0]; vertices.len()],
        triangles: Vec::new(),
        vertices,
        weight: None,
    }))
}

/// Influences are `(weight-table bone, bind x, bind y, weight)`.
pub(crate) fn skinned_mesh(
    name: &str,
    bones: &[&str],
    vertices: Vec<Vec<(usize, f32, f32, f32)>>,
) -> DisplayData {
    let weight = WeightData {
        bones: bones.iter().map(|bone| bone.to_string()).collect(),
        vertices: vertices
            .into_iter()
            .map(|influences| {
                influences
                    .into_iter()
                    .map(|(bone, x, y, weight)| VertexWeight { bone, x, y, weight })
                    .collect()
            })
            .collect(),
    };
    DisplayData::Mesh(Arc::new(MeshDisplayData {
        name: name.to_string(),
        transform: Transform::IDENTITY,
        texture: Some(texture(name, 32.0, 32.0)),
        vertices: Vec::new(),
        uvs: Vec::new(),
        triangles: Vec::new(),
        weight: Some(weight),
    }))
}

pub(crate) fn bounding_box(name: &str, bounding_box: BoundingBox) -> DisplayData {
    DisplayData::BoundingBox(Arc::new(BoundingBoxDisplayData {
        name: name.to_string(),
        transform: Transform::IDENTITY,
        bounding_box,
    }))
}
