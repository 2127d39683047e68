use approx::assert_relative_eq;
use psd_engine_core::{
    math, EngineError, GeometricEngine, NodeKind, PoseVector, SceneGraph, SceneSpec,
};
use psd_test_fixtures::scenes;

fn face() -> SceneGraph {
    let spec: SceneSpec = scenes::load("face").expect("face scene fixture");
    SceneGraph::from_spec(&spec).expect("face scene builds")
}

#[test]
fn fixture_scene_builds_hierarchy_and_flags() {
    let scene = face();
    assert_eq!(scene.kind_of("head"), Some(NodeKind::Transform));
    assert_eq!(scene.parent_of("brow_L").unwrap().as_deref(), Some("head"));
    assert!(scene.flag("brow_L", "invTx").unwrap());
    assert!(!scene.flag("brow_L", "invTy").unwrap());

    let err = scene.flag("cheek_L", "invTx").unwrap_err();
    assert!(matches!(err, EngineError::AttributeNotFound { .. }));

    let w = scene.world_matrix("chin").unwrap();
    assert_relative_eq!(w[(1, 3)], 142.0, epsilon = 1e-9);
}

#[test]
fn solver_weights_follow_driver() {
    let mut scene = face();
    scene.create_solver("jaw_s", "jaw_ctrl", None).unwrap();
    scene
        .set_local_pose("jaw_ctrl", PoseVector::IDENTITY)
        .unwrap();
    scene.add_pose("jaw_s", "rest").unwrap();
    scene
        .set_local_pose("jaw_ctrl", PoseVector::new([0.0; 3], [30.0, 0.0, 0.0]))
        .unwrap();
    scene.add_pose("jaw_s", "open").unwrap();

    let w = scene.solver_weights("jaw_s").unwrap();
    assert_relative_eq!(w[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(w[1], 1.0, epsilon = 1e-9);

    scene
        .set_local_pose("jaw_ctrl", PoseVector::IDENTITY)
        .unwrap();
    let w = scene.solver_weights("jaw_s").unwrap();
    assert_relative_eq!(w[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(w[1], 0.0, epsilon = 1e-9);

    // halfway sits strictly between the two samples
    scene
        .set_local_pose("jaw_ctrl", PoseVector::new([0.0; 3], [15.0, 0.0, 0.0]))
        .unwrap();
    let w = scene.solver_weights("jaw_s").unwrap();
    assert!(w[0] > 0.0 && w[0] < 1.0, "rest weight {}", w[0]);
    assert!(w[1] > 0.0 && w[1] < 1.0, "open weight {}", w[1]);
}

#[test]
fn update_pose_resamples_driver() {
    let mut scene = face();
    scene.create_solver("jaw_s", "jaw_ctrl", None).unwrap();
    scene.add_pose("jaw_s", "open").unwrap();
    scene
        .set_local_pose("jaw_ctrl", PoseVector::new([0.0, 1.0, 0.0], [0.0; 3]))
        .unwrap();
    let w = scene.solver_weights("jaw_s").unwrap();
    assert!(w[0] < 1.0);
    assert_eq!(scene.update_pose("jaw_s", "open").unwrap(), 0);
    let w = scene.solver_weights("jaw_s").unwrap();
    assert_relative_eq!(w[0], 1.0, epsilon = 1e-12);
}

#[test]
fn slots_must_stay_dense() {
    let mut scene = face();
    scene.create_blend("chin_bm").unwrap();
    let err = scene
        .set_blend_target_matrix("chin_bm", 1, &math::identity())
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotOutOfRange { index: 1, len: 0, .. }));

    scene
        .set_blend_target_matrix("chin_bm", 0, &math::compose([1.0, 0.0, 0.0], [0.0; 3]))
        .unwrap();
    assert_eq!(scene.blend_target_count("chin_bm").unwrap(), 1);
    let m = scene.blend_target_matrix("chin_bm", 0).unwrap();
    assert_relative_eq!(m[(0, 3)], 1.0);
}

#[test]
fn set_world_matrix_solves_local() {
    let mut scene = face();
    let target = math::compose([1.0, 2.0, 3.0], [0.0, 45.0, 0.0]);
    scene.set_world_matrix("chin", &target).unwrap();
    let local = scene.local_pose("chin").unwrap();
    assert_relative_eq!(local.translation[1], 2.0 - 150.0, epsilon = 1e-9);
    assert_relative_eq!(local.rotation[1], 45.0, epsilon = 1e-9);
    assert_relative_eq!(scene.world_matrix("chin").unwrap(), target, epsilon = 1e-9);
}
