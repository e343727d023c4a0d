//! Runtime configuration and failure isolation.

mod common;

use std::sync::Arc;

use csgray_ir::{AnimatorDesc, Array, Object, SceneDesc, Surface, Transform3};
use csgray_scene::{AnimatorContext, AnimatorRegistry, CameraAction, EngineError, Scene};
use csgray_sched::tiles::slice_range;
use csgray_sched::{CommandKind, DispatchError, SliceError, ThreadedFactory};
use csgray_simd::{row_stride, SimdConfig, SimdError};

use common::*;

fn visible(scene: &Scene) -> Vec<u32> {
    let stride = scene.x_row();
    scene
        .frame()
        .chunks(stride)
        .flat_map(|row| row[..scene.width()].to_vec())
        .collect()
}

#[test]
fn test_set_simd_is_idempotent() {
    let mut scene = Scene::new(&gallery(), frame(), inline(1)).unwrap();
    let initial = scene.simd().pack();
    assert_eq!(initial, SimdConfig::new(4, 1).pack());
    let first = scene.set_simd(0).unwrap();
    let second = scene.set_simd(0).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, initial);

    assert_eq!(scene.set_simd(0x0101).unwrap(), 0x0101);
    assert_eq!(scene.set_simd(0x0101).unwrap(), 0x0101);
    assert_eq!(scene.x_row(), row_stride(40, 4));
    assert_eq!(scene.frame().len(), scene.x_row() * scene.height());
}

#[test]
fn test_pinned_unsupported_width_is_an_error() {
    let mut scene = Scene::new(&gallery(), frame(), inline(1)).unwrap();
    let before = (scene.simd(), scene.x_row());

    let err = scene.set_simd(8).unwrap_err();
    assert!(matches!(
        err,
        SimdError::Unsupported {
            requested: SimdConfig { width: 8, variant: 0 },
            ..
        }
    ));
    assert!(matches!(scene.set_simd(0x0301), Err(SimdError::Unsupported { .. })));
    assert_eq!((scene.simd(), scene.x_row()), before);
}

#[test]
fn test_output_identical_across_widths() {
    let mut scene = Scene::new(&gallery(), frame(), threaded(3)).unwrap();
    scene.update(500, CameraAction::None).unwrap();
    scene.render(500).unwrap();
    let wide = visible(&scene);
    assert_eq!(scene.x_row(), row_stride(40, 16));

    for packed in [0x0101, 0x0102] {
        scene.set_simd(packed).unwrap();
        scene.render(500).unwrap();
        assert_eq!(visible(&scene), wide, "config {packed:#06x}");
    }
}

#[test]
fn test_fsaa_clamps_to_substrate() {
    let mut scene = Scene::new(&two_spheres(), frame(), inline(1)).unwrap();
    assert_eq!(scene.fsaa().level(), 0);
    assert_eq!(scene.set_fsaa(3), 2);
    assert_eq!(scene.set_fsaa(3), 2);
    assert_eq!(scene.set_fsaa(1), 1);
    assert_eq!(scene.set_fsaa(0), 0);
}

/// Eight spheres sharing a custom animator that panics for one object at
/// one instant.
fn fragile_scene(victim: usize) -> (SceneDesc, AnimatorRegistry) {
    let mut desc = SceneDesc::new().with_color("white", 0xffffff);
    let mut objects = vec![camera_at(-10.0)];
    for i in 0..8 {
        objects.push(
            Object::surface(Surface::sphere(0.4, "white"))
                .with_transform(Transform3::at(i as f64 - 3.5, 0.0, 0.0))
                .animated(AnimatorDesc::Custom { name: "fragile".into() }),
        );
    }
    desc.root = Array::new(objects);

    let mut registry = AnimatorRegistry::new();
    registry.register(
        "fragile",
        Arc::new(move |time: i64, _last: i64, t: &mut Transform3, ctx: &AnimatorContext<'_>| {
            if time == 666 && ctx.object == victim {
                panic!("object {victim} cannot animate");
            }
            t.position.y = ctx.base.position.y + time as f64 * 1e-4;
        }),
    );
    (desc, registry)
}

#[test]
fn test_one_failing_worker_is_named() {
    init_logging();
    let victim = 6;
    for threads in [2, 4, 8] {
        let (desc, registry) = fragile_scene(victim);
        let mut scene = Scene::new(&desc, frame(), platform(threads, Box::new(ThreadedFactory), registry)).unwrap();
        let objects = scene.compiled().objects.len();
        let culprit = (0..threads)
            .find(|&w| slice_range(w, threads, objects).contains(&victim))
            .unwrap();
        scene.update(100, CameraAction::None).unwrap();

        let err = scene.update(666, CameraAction::None).unwrap_err();
        let EngineError::Dispatch(DispatchError::Workers { kind, failures }) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(kind, CommandKind::Update);
        assert_eq!(failures.len(), 1, "{threads} workers");
        assert_eq!(failures[0].worker, culprit);
        assert_eq!(failures[0].phase, 1);
        assert!(matches!(&failures[0].error, SliceError::Panicked(msg) if msg.contains("cannot animate")));

        // Refused until acknowledged, then back in business.
        assert!(scene.is_blocked());
        assert!(matches!(scene.render(666), Err(EngineError::Unacknowledged)));
        assert!(matches!(scene.update(700, CameraAction::None), Err(EngineError::Unacknowledged)));
        assert!(scene.acknowledge());
        assert!(!scene.acknowledge());
        scene.update(700, CameraAction::None).unwrap();
        scene.render(700).unwrap();
    }
}

#[test]
fn test_inline_failure_is_named_too() {
    let victim = 3;
    let (desc, registry) = fragile_scene(victim);
    let mut platform = inline(4);
    platform.animators = registry;
    let mut scene = Scene::new(&desc, frame(), platform).unwrap();
    let objects = scene.compiled().objects.len();
    let culprit = (0..4).find(|&w| slice_range(w, 4, objects).contains(&victim)).unwrap();
    let err = scene.update(666, CameraAction::None).unwrap_err();
    let EngineError::Dispatch(dispatch) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(dispatch.workers(), vec![culprit]);
}
