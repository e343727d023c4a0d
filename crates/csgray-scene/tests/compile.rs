//! Compilation: bounding volumes, trims and allocator hygiene.

mod common;

use std::sync::atomic::Ordering;

use csgray_ir::{Array, Object, RelOp, Relation, SceneDesc, Surface, Transform3};
use csgray_scene::compiler::placement;
use csgray_scene::{compile, AnimatorRegistry, Element, HeapAllocator, Scene, SceneError};
use csgray_sched::{DispatchError, ThreadPoolFactory, SliceRunner, WorkerPool};

use common::*;

#[test]
fn test_bounds_contain_included_and_skip_untied() {
    let mut desc = SceneDesc::new().with_color("white", 0xffffff);
    let placements = [
        Transform3::at(0.0, 0.0, 0.0),
        Transform3::at(2.0, 1.0, 0.0).rotated(0.0, 30.0, 45.0),
        Transform3::at(-1.0, 0.5, 3.0).scaled(2.0, 1.0, 0.5),
        Transform3::at(100.0, 0.0, 0.0),
    ];
    let objects: Vec<Object> = placements
        .iter()
        .map(|t| Object::surface(Surface::sphere(1.0, "white")).with_transform(*t))
        .collect();
    let group = Array::new(objects).with_relations(vec![
        Relation::new(-1, RelOp::BoundArray, -1),
        Relation::new(-1, RelOp::UntieIndex, 3),
    ]);
    desc.root = Array::new(vec![camera_at(-5.0), Object::array(group)]);

    let compiled = compile(&desc, &AnimatorRegistry::new(), &mut HeapAllocator::new()).unwrap();
    let group = &compiled.arrays[1];
    assert!(group.bounded);
    assert_eq!(group.included, vec![true, true, true, false]);

    for (pos, element) in group.elements.iter().enumerate() {
        let Element::Surface(s) = *element else {
            panic!("expected a surface at {pos}");
        };
        let surface = &compiled.surfaces[s];
        let placed = surface
            .local_bounds
            .transformed(&placement(&compiled.objects[surface.object].transform));
        assert_eq!(group.local_bounds.contains(&placed, 1e-9), pos != 3, "element {pos}");
        assert!(group.extent.contains(&placed, 1e-9));
    }
    assert!(group.local_bounds.max.x < 10.0);
}

#[test]
fn test_instanced_program_runs_per_instance() {
    let mut desc = two_spheres();
    let pair = std::mem::take(&mut desc.root);
    desc.arrays.insert("pair".into(), pair);
    desc.root = Array::new(vec![
        camera_at(-6.0),
        Object::instance("pair"),
        Object::instance("pair").with_transform(Transform3::at(0.0, 5.0, 0.0)),
    ]);
    let compiled = compile(&desc, &AnimatorRegistry::new(), &mut HeapAllocator::new()).unwrap();
    // Each instance brings its own camera too.
    assert_eq!(compiled.cameras.len(), 3);
    let trimmed: Vec<usize> = compiled
        .surfaces
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.trims.is_empty())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(trimmed, vec![0, 2]);
    assert_eq!(compiled.surfaces[2].trims[0].operand, 3);
}

#[test]
fn test_compile_failure_frees_everything() {
    init_logging();
    let mut desc = two_spheres();
    desc.root.relations.push(Relation::new(0, RelOp::MinusInner, 2));

    let (tracked, live) = Tracked::new();
    let mut platform = threaded(2);
    platform.allocator = Box::new(tracked);
    let err = Scene::new(&desc, frame(), platform).unwrap_err();
    assert!(matches!(err, SceneError::MalformedRelation { index: 1, .. }), "{err}");
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

struct NoThreads;

impl ThreadPoolFactory for NoThreads {
    fn create(
        &self,
        _threads: usize,
        _runner: std::sync::Arc<dyn SliceRunner>,
    ) -> csgray_sched::Result<Box<dyn WorkerPool>> {
        Err(DispatchError::Spawn {
            worker: 0,
            source: std::io::Error::other("no threads here"),
        })
    }
}

#[test]
fn test_pool_failure_frees_everything() {
    let (tracked, live) = Tracked::new();
    let mut platform = threaded(2);
    platform.allocator = Box::new(tracked);
    platform.pool = Box::new(NoThreads);
    let err = Scene::new(&two_spheres(), frame(), platform).unwrap_err();
    assert!(matches!(err, SceneError::Pool(DispatchError::Spawn { worker: 0, .. })));
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn test_drop_frees_everything() {
    let (tracked, live) = Tracked::new();
    let mut platform = threaded(4);
    platform.allocator = Box::new(tracked);
    let scene = Scene::new(&gallery(), frame(), platform).unwrap();
    assert!(live.load(Ordering::SeqCst) > 0);
    assert_eq!(scene.allocated(), scene.stats().bytes);
    drop(scene);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_frame_rejected() {
    let mut spec = frame();
    spec.width = 0;
    assert!(matches!(
        Scene::new(&two_spheres(), spec, inline(1)),
        Err(SceneError::InvalidFrame(_))
    ));
}
