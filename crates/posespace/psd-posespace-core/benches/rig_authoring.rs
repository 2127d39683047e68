use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use psd_engine_core::{GeometricEngine, PoseVector, SceneGraph};
use psd_posespace::{persist, PoseSpaceManager};

/// A driver plus `driven` sibling targets under one root.
fn scene(driven: usize) -> SceneGraph {
    let mut scene = SceneGraph::new();
    scene.create_transform("root", None).unwrap();
    scene.create_transform("ctrl", Some("root")).unwrap();
    for i in 0..driven {
        let name = format!("target_{i}");
        scene.create_transform(&name, Some("root")).unwrap();
        scene
            .set_local_pose(&name, PoseVector::new([i as f64, 1.0, 0.0], [0.0; 3]))
            .unwrap();
    }
    scene
}

fn build_rig(driven: usize, poses: usize) -> PoseSpaceManager<SceneGraph> {
    let mut mgr = PoseSpaceManager::new(scene(driven));
    mgr.register_driver("ctrl", "ctrl").unwrap();
    for i in 0..driven {
        mgr.add_driven("ctrl", &format!("target_{i}")).unwrap();
    }
    for p in 0..poses {
        let angle = 5.0 * p as f64;
        mgr.set_node_pose("ctrl", PoseVector::new([0.0; 3], [angle, angle * 0.5, 0.0]))
            .unwrap();
        mgr.add_pose("ctrl", &format!("pose_{p}")).unwrap();
    }
    mgr
}

fn bench_authoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("authoring");
    for &(driven, poses) in &[(2usize, 4usize), (8, 8), (16, 16)] {
        group.bench_with_input(
            BenchmarkId::new("build_rig", format!("{driven}x{poses}")),
            &(driven, poses),
            |b, &(driven, poses)| b.iter(|| black_box(build_rig(driven, poses))),
        );
    }

    group.bench_function("delete_first_pose_16x16", |b| {
        b.iter_batched(
            || build_rig(16, 16),
            |mut mgr| {
                mgr.delete_pose("ctrl", "pose_0").unwrap();
                black_box(mgr)
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut mgr = build_rig(8, 16);
    mgr.engine_mut()
        .set_local_pose("ctrl", PoseVector::new([0.0; 3], [12.5, 3.0, 0.0]))
        .unwrap();
    c.bench_function("world_matrix_8x16", |b| {
        b.iter(|| black_box(mgr.engine().world_matrix("target_7").unwrap()))
    });
}

fn bench_persistence(c: &mut Criterion) {
    let mgr = build_rig(8, 8);
    let doc = persist::from_json(&persist::to_json(mgr.store()).unwrap()).unwrap();
    c.bench_function("replay_8x8", |b| {
        b.iter_batched(
            || PoseSpaceManager::new(scene(8)),
            |mut target| {
                persist::replay(&doc, &mut target).unwrap();
                black_box(target)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_authoring, bench_evaluation, bench_persistence);
criterion_main!(benches);
