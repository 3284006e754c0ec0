use armature2d::{
    Armature, ArmatureData, BlendMode, BoneData, ColorTransform, DisplayAdapter, DisplayData,
    DisplayFactory, FrameState, ImageDisplayData, MeshDisplayData, MeshState, Point, Rectangle,
    SkinData, SlotData, TextureData, Transform, TransformState,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

type Trace = Rc<RefCell<Vec<Value>>>;

struct TraceAdapter {
    slot: String,
    trace: Trace,
}

impl TraceAdapter {
    fn push(&self, event: &str, detail: Value) {
        self.trace
            .borrow_mut()
            .push(json!({ "slot": self.slot, "event": event, "detail": detail }));
    }
}

impl DisplayAdapter for TraceAdapter {
    type Display = u32;

    fn init_display(&mut self, display: &u32) {
        self.push("init", json!(display));
    }

    fn dispose_display(&mut self, display: &u32) {
        self.push("dispose", json!(display));
    }

    fn on_update_display(&mut self, current: Option<&u32>) {
        self.push("current", json!(current));
    }

    fn add_display(&mut self) {
        self.push("add", Value::Null);
    }

    fn replace_display(&mut self, previous: Option<&u32>) {
        self.push("replace", json!(previous));
    }

    fn remove_display(&mut self) {
        self.push("remove", Value::Null);
    }

    fn update_z_order(&mut self, z_order: i32) {
        self.push("z_order", json!(z_order));
    }

    fn update_visible(&mut self, visible: bool) {
        self.push("visible", json!(visible));
    }

    fn update_blend_mode(&mut self, blend_mode: BlendMode) {
        self.push("blend_mode", json!(format!("{blend_mode:?}")));
    }

    fn update_color(&mut self, color: &ColorTransform) {
        self.push("color", json!(color.alpha_multiplier));
    }

    fn update_frame(&mut self, frame: &FrameState<'_>) {
        self.push(
            "frame",
            json!({
                "display": frame.display_data.map(DisplayData::name),
                "mesh": frame.mesh.is_some(),
                "pivot": [frame.pivot.x, frame.pivot.y],
            }),
        );
    }

    fn update_mesh(&mut self, mesh: &MeshState<'_>) {
        self.push("mesh", json!(mesh.vertices));
    }

    fn update_transform(&mut self, transform: &TransformState<'_>) {
        let m = transform.matrix;
        self.push("transform", json!([m.a, m.b, m.c, m.d, m.tx, m.ty]));
    }
}

#[derive(Default)]
struct TraceFactory {
    trace: Trace,
    next: u32,
}

impl DisplayFactory for TraceFactory {
    type Adapter = TraceAdapter;

    fn create_adapter(&mut self, _armature: &ArmatureData, slot: &SlotData) -> TraceAdapter {
        TraceAdapter {
            slot: slot.name.clone(),
            trace: Rc::clone(&self.trace),
        }
    }

    fn create_raw_display(&mut self, _slot: &SlotData) -> u32 {
        self.next += 1;
        self.next
    }

    fn create_mesh_display(&mut self, _slot: &SlotData) -> u32 {
        self.next += 1;
        self.next
    }

    fn create_armature_display(&mut self, _armature: &ArmatureData) -> Option<u32> {
        None
    }
}

fn demo_data() -> ArmatureData {
    let texture = Arc::new(TextureData {
        name: "head".to_string(),
        atlas_scale: 1.0,
        rotated: false,
        region: Rectangle {
            x: 0.0,
            y: 0.0,
            width: 64.0,
            height: 64.0,
        },
        frame: None,
    });
    let head = DisplayData::Image(Arc::new(ImageDisplayData {
        name: "head".to_string(),
        transform: Transform::from_translation(0.0, -32.0),
        pivot: Point::new(0.5, 0.5),
        texture: Some(Arc::clone(&texture)),
    }));
    let cape = DisplayData::Mesh(Arc::new(MeshDisplayData {
        name: "cape".to_string(),
        transform: Transform::IDENTITY,
        texture: Some(texture),
        vertices: vec![[0.0, 0.0], [16.0, 0.0], [0.0, 24.0]],
        uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        triangles: vec![0, 1, 2],
        weight: None,
    }));

    ArmatureData::new(
        "demo",
        vec![BoneData {
            name: "root".to_string(),
            parent: None,
            length: 0.0,
            transform: Transform::from_translation(100.0, 100.0),
        }],
        vec![SlotData {
            name: "body".to_string(),
            bone: 0,
            display_index: Some(0),
            z_order: 0,
            blend_mode: BlendMode::Normal,
            color: ColorTransform::IDENTITY,
        }],
        vec![SkinData::new("default").with_displays("body", vec![Some(head), Some(cape)])],
    )
    .expect("demo armature data")
}

fn main() {
    let mut factory = TraceFactory::default();
    let mut armature =
        Armature::build(Arc::new(demo_data()), None, &mut factory).expect("build armature");

    armature.update(None);
    armature.with_slot("body", |slot, ctx| slot.set_display_index(Some(1), ctx));
    armature.update(None);
    armature.dispose();

    let trace = factory.trace.borrow();
    println!(
        "{}",
        serde_json::to_string_pretty(&*trace).expect("serialize trace")
    );
}
