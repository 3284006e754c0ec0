use crate::{Matrix, PoseCache, Transform};

#[test]
fn stored_poses_are_fetched_by_id() {
    let mut cache = PoseCache::new();
    assert!(cache.is_empty());

    let first_matrix = Matrix::from_translation(1.0, 2.0);
    let first = cache.allocate_and_store(&first_matrix, &Transform::from_translation(1.0, 2.0));
    let second = cache.allocate_and_store(&Matrix::IDENTITY, &Transform::IDENTITY);

    assert_ne!(first, second);
    assert_eq!(cache.len(), 2);
    let pose = cache.fetch(first).expect("first pose");
    assert_eq!(pose.matrix, first_matrix);
    assert_eq!(pose.transform, Transform::from_translation(1.0, 2.0));
    assert_eq!(cache.fetch(second).map(|pose| pose.matrix), Some(Matrix::IDENTITY));
}

#[test]
fn clear_invalidates_every_id() {
    let mut cache = PoseCache::new();
    let id = cache.allocate_and_store(&Matrix::IDENTITY, &Transform::IDENTITY);

    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.fetch(id).is_none());
}
