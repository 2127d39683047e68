use approx::assert_relative_eq;
use psd_engine_core::{math, GeometricEngine, PoseVector, SceneGraph, SceneSpec};
use psd_posespace::{ManagerConfig, MirrorConvention, PoseSpaceError, PoseSpaceManager};
use psd_test_fixtures::scenes;

const FLAGS: [&str; 6] = ["invTx", "invTy", "invTz", "invRx", "invRy", "invRz"];

fn face_scene() -> SceneGraph {
    let spec: SceneSpec = scenes::load("face").expect("face scene fixture");
    SceneGraph::from_spec(&spec).expect("face scene builds")
}

/// brow_L driving browInner_L and browOuter_L with a rest and a raise pose.
fn brow_rig(scene: SceneGraph) -> PoseSpaceManager<SceneGraph> {
    let mut mgr = PoseSpaceManager::new(scene);
    mgr.register_driver("brow_L", "brow_L").unwrap();
    mgr.add_driven("brow_L", "browInner_L").unwrap();
    mgr.add_driven("brow_L", "browOuter_L").unwrap();
    mgr.add_pose("brow_L", "rest").unwrap();

    mgr.set_node_pose("brow_L", PoseVector::new([3.0, 9.0, 8.0], [0.0, 0.0, 10.0]))
        .unwrap();
    mgr.add_pose("brow_L", "raise").unwrap();
    mgr.engine_mut()
        .set_local_pose("browInner_L", PoseVector::new([0.5, 0.2, 0.0], [0.0, 10.0, 5.0]))
        .unwrap();
    mgr.update_driven("brow_L", "raise", "browInner_L").unwrap();
    mgr.engine_mut()
        .set_local_pose("browOuter_L", PoseVector::new([0.0, 0.4, -0.1], [5.0, 0.0, 0.0]))
        .unwrap();
    mgr.update_driven("brow_L", "raise", "browOuter_L").unwrap();
    mgr.go_to_pose("brow_L", "rest").unwrap();
    mgr
}

fn assert_rows_close(actual: [f64; 6], expected: [f64; 6]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, epsilon = 1e-9);
    }
}

#[test]
fn prefix_tokens_flip_flagged_translation() {
    let mut scene = SceneGraph::new();
    for node in ["L_brow", "R_brow"] {
        scene.create_transform(node, None).unwrap();
        for attr in FLAGS {
            scene.set_attribute(node, attr, attr == "invTx").unwrap();
        }
    }
    let config = ManagerConfig::default().with_mirror(MirrorConvention::new("L_", "R_"));
    let mut mgr = PoseSpaceManager::with_config(scene, config);
    mgr.register_driver("L_brow", "L_brow").unwrap();
    mgr.set_node_pose("L_brow", PoseVector::new([1.0, 0.0, 0.0], [0.0; 3]))
        .unwrap();
    mgr.add_pose("L_brow", "out").unwrap();

    assert_eq!(mgr.mirror_driver("L_brow").unwrap(), "R_brow");
    let record = mgr.record("R_brow").unwrap();
    assert_eq!(record.controller(), "R_brow");
    assert_eq!(
        record.pose("out").unwrap().vector(),
        PoseVector::new([-1.0, 0.0, 0.0], [0.0; 3])
    );
    assert_eq!(
        mgr.engine().pose_names("R_brow_pmInterpolator").unwrap(),
        ["out"]
    );
}

#[test]
fn mirrored_rig_matches_source_shape() {
    let mut mgr = brow_rig(face_scene());
    assert_eq!(mgr.mirror_driver("brow_L").unwrap(), "brow_R");

    let record = mgr.record("brow_R").unwrap();
    assert_eq!(record.driven(), ["browInner_R", "browOuter_R"]);
    let names: Vec<&str> = record.poses().names().collect();
    assert_eq!(names, ["rest", "raise"]);

    // brow flags: invTx, invRy, invRz
    let poses = mgr.pose_table("brow_R").unwrap();
    assert_rows_close(poses[0].values, [-3.0, 8.0, 8.0, 0.0, 0.0, 0.0]);
    assert_rows_close(poses[1].values, [-3.0, 9.0, 8.0, 0.0, 0.0, -10.0]);

    let inner = mgr.driven_table("brow_R", "browInner_R").unwrap();
    assert_rows_close(inner[0].values, [0.0; 6]);
    assert_rows_close(inner[1].values, [-0.5, 0.2, 0.0, 0.0, -10.0, -5.0]);
    let outer = mgr.driven_table("brow_R", "browOuter_R").unwrap();
    assert_rows_close(outer[1].values, [0.0, 0.4, -0.1, 5.0, 0.0, 0.0]);

    let slot = mgr.engine().blend_target_matrix("browInner_R_bm", 1).unwrap();
    let expected = math::compose([-0.5, 0.2, 0.0], [0.0, -10.0, -5.0]);
    assert_relative_eq!(slot, expected, epsilon = 1e-9);

    assert_eq!(
        mgr.engine().blends_weighted_by("brow_R_pmInterpolator"),
        ["browInner_R_bm", "browOuter_R_bm"]
    );
    assert!(mgr.audit().is_empty(), "{:?}", mgr.audit());
}

#[test]
fn mirrored_driver_deforms_its_side() {
    let mut mgr = brow_rig(face_scene());
    mgr.mirror_driver("brow_L").unwrap();

    mgr.go_to_pose("brow_R", "rest").unwrap();
    let rest = mgr.engine().rest_world_matrix("browInner_R_pm").unwrap();
    assert_relative_eq!(mgr.engine().world_matrix("browInner_R").unwrap(), rest, epsilon = 1e-9);

    mgr.go_to_pose("brow_R", "raise").unwrap();
    let expected = rest * math::compose([-0.5, 0.2, 0.0], [0.0, -10.0, -5.0]);
    assert_relative_eq!(
        mgr.engine().world_matrix("browInner_R").unwrap(),
        expected,
        epsilon = 1e-9
    );
}

#[test]
fn engine_failure_mid_mirror_leaves_no_trace() {
    let mut mgr = brow_rig(face_scene());
    let engine_before = mgr.engine().state().clone();
    let store_before = mgr.store().clone();

    mgr.engine_mut().inject_fault("add_pose", 2);
    let err = mgr.mirror_driver("brow_L").unwrap_err();
    match &err {
        PoseSpaceError::EngineFailure { operation, args, .. } => {
            assert_eq!(*operation, "mirror_driver");
            assert_eq!(args, &["brow_L".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mgr.engine().state(), &engine_before);
    assert_eq!(mgr.store(), &store_before);
    assert!(mgr.record("brow_R").is_err());

    // the rig is still usable and mirrors cleanly afterwards
    mgr.mirror_driver("brow_L").unwrap();
    assert!(mgr.audit().is_empty());
}

#[test]
fn missing_inversion_flag_is_reported_before_any_change() {
    let mut scene = face_scene();
    scene.create_transform("cheek_R", Some("head")).unwrap();
    let mut mgr = PoseSpaceManager::new(scene);
    mgr.register_driver("brow_L", "brow_L").unwrap();
    mgr.add_driven("brow_L", "cheek_L").unwrap();
    mgr.add_pose("brow_L", "rest").unwrap();
    let engine_before = mgr.engine().state().clone();

    let err = mgr.mirror_driver("brow_L").unwrap_err();
    match err {
        PoseSpaceError::NotFound { what, name } => {
            assert_eq!(what, "attribute");
            assert_eq!(name, "cheek_L.invTx");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mgr.engine().state(), &engine_before);
    assert_eq!(mgr.store().len(), 1);
}

#[test]
fn mirror_refuses_existing_or_missing_targets() {
    let mut mgr = brow_rig(face_scene());
    mgr.mirror_driver("brow_L").unwrap();
    assert!(mgr.mirror_driver("brow_L").unwrap_err().is_already_exists());
    assert!(mgr.mirror_driver("brow_R").unwrap_err().is_already_exists());

    // jaw side counterpart does not exist in the scene
    let mut scene = face_scene();
    scene.create_transform("jaw_L", Some("head")).unwrap();
    let mut mgr = PoseSpaceManager::new(scene);
    mgr.register_driver("jaw_L", "jaw_L").unwrap();
    let err = mgr.mirror_driver("jaw_L").unwrap_err();
    assert!(err.is_not_found(), "{err}");
}
