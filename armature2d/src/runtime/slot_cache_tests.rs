use super::test_support::{Event, RecordingAdapter, TestFactory, bone, build, image, slot};
use crate::{Armature, ArmatureData, Point, SkinData, Transform};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn body_data(cache_frame_rate: u32) -> ArmatureData {
    let mut data = ArmatureData::new(
        "hero",
        vec![bone("root", None, Transform::from_translation(1.0, 2.0))],
        vec![slot("body", 0, Some(0))],
        vec![SkinData::new("default").with_displays(
            "body",
            vec![Some(image(
                "a",
                Transform::from_translation(3.0, 0.0),
                Point::ZERO,
                None,
            ))],
        )],
    )
    .expect("armature data");
    data.cache_frame_rate = cache_frame_rate;
    data
}

fn cached_armature(factory: &mut TestFactory) -> Armature<RecordingAdapter> {
    build(body_data(24), factory)
}

fn transform_events(factory: &TestFactory) -> usize {
    factory.count("body", |e| matches!(e, Event::Transform { .. }))
}

#[test]
fn same_frame_twice_reuses_the_cached_pose() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);

    armature.update(Some(0));
    let pose = armature.slot("body").expect("slot").cached_pose();
    assert!(pose.is_some());
    assert_eq!(armature.pose_cache().len(), 1);
    assert_eq!(transform_events(&factory), 1);

    armature.update(Some(0));
    let slot = armature.slot("body").expect("slot");
    assert_eq!(slot.cached_pose(), pose);
    assert_eq!(slot.cached_frame_pose(0), pose);
    assert_eq!(armature.pose_cache().len(), 1);
    assert_eq!(transform_events(&factory), 1);
}

#[test]
fn cached_pose_stores_decomposed_world_transform() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);
    armature.update(Some(0));

    let slot = armature.slot_mut("body").expect("slot");
    let id = slot.cached_pose().expect("cached pose");
    let matrix = *slot.global_transform_matrix();
    assert_approx(matrix.tx, 4.0);
    assert_approx(matrix.ty, 2.0);
    let global = *slot.global_transform();
    assert_approx(global.x, 4.0);
    assert_approx(global.y, 2.0);

    let pose = armature.pose_cache().fetch(id).expect("pose");
    assert_eq!(pose.matrix, matrix);
    assert_eq!(pose.transform, global);
}

#[test]
fn unmapped_frame_adopts_the_resident_pose() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);

    armature.update(Some(0));
    armature.update(Some(5));

    let slot = armature.slot("body").expect("slot");
    assert!(slot.cached_frame_pose(0).is_some());
    assert_eq!(slot.cached_frame_pose(5), slot.cached_frame_pose(0));
    assert_eq!(armature.pose_cache().len(), 1);
    assert_eq!(transform_events(&factory), 1);
}

#[test]
fn moved_parent_stores_a_new_pose_and_old_frames_fetch_theirs() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);

    armature.update(Some(0));
    armature
        .bone_mut("root")
        .expect("bone")
        .set_offset(Transform::from_translation(5.0, 0.0));
    armature.update(Some(1));

    let slot = armature.slot("body").expect("slot");
    assert_eq!(armature.pose_cache().len(), 2);
    assert_ne!(slot.cached_frame_pose(1), slot.cached_frame_pose(0));
    assert_approx(slot.global_transform_matrix().tx, 9.0);
    assert_eq!(transform_events(&factory), 2);

    // Frame 0 was computed before the move; it is fetched, not recomputed.
    armature.update(Some(0));
    let slot = armature.slot("body").expect("slot");
    assert_eq!(slot.cached_pose(), slot.cached_frame_pose(0));
    assert_approx(slot.global_transform_matrix().tx, 4.0);
    assert_eq!(armature.pose_cache().len(), 2);
    assert_eq!(transform_events(&factory), 3);
}

#[test]
fn clearing_the_cache_forces_recomputation() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);
    armature.update(Some(0));

    armature.clear_pose_cache();
    assert!(armature.pose_cache().is_empty());
    let slot = armature.slot("body").expect("slot");
    assert_eq!(slot.cached_pose(), None);
    assert_eq!(slot.cached_frame_pose(0), None);
    assert!(slot.dirty().transform);

    armature.update(Some(0));
    assert_eq!(armature.pose_cache().len(), 1);
    assert_eq!(transform_events(&factory), 2);
}

#[test]
fn uncached_updates_never_touch_the_cache() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);

    armature.update(None);
    armature.update(None);

    assert!(armature.pose_cache().is_empty());
    let slot = armature.slot_mut("body").expect("slot");
    assert_eq!(slot.cached_pose(), None);
    assert_approx(slot.global_transform().x, 4.0);
    assert_approx(slot.global_transform().y, 2.0);
}

#[test]
fn changing_cache_frame_rate_evicts_the_cache() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);
    armature.update(Some(0));

    armature.set_cache_frame_rate(24);
    assert_eq!(armature.pose_cache().len(), 1);

    armature.set_cache_frame_rate(30);
    assert!(armature.pose_cache().is_empty());
    assert_eq!(armature.slot("body").expect("slot").cached_pose(), None);
}

#[test]
fn zero_cache_frame_rate_ignores_frame_indices() {
    let mut factory = TestFactory::new();
    let mut armature = build(body_data(0), &mut factory);

    armature.update(Some(0));
    armature.update(Some(0));

    assert!(armature.pose_cache().is_empty());
    let slot = armature.slot("body").expect("slot");
    assert_eq!(slot.cached_pose(), None);
    assert_eq!(slot.cached_frame_pose(0), None);
    assert_approx(slot.global_transform_matrix().tx, 4.0);
    assert_eq!(transform_events(&factory), 1);
}

#[test]
fn huge_frame_indices_are_cached_sparsely() {
    let mut factory = TestFactory::new();
    let mut armature = cached_armature(&mut factory);

    armature.update(Some(usize::MAX));
    armature.update(Some(200_000_000));

    let slot = armature.slot("body").expect("slot");
    let pose = slot.cached_pose();
    assert!(pose.is_some());
    assert_eq!(slot.cached_frame_pose(usize::MAX), pose);
    assert_eq!(slot.cached_frame_pose(200_000_000), pose);
    assert_eq!(slot.cached_frame_pose(0), None);
    assert_eq!(armature.pose_cache().len(), 1);
}
