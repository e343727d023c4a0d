#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use csgray_ir::{
    Array, AnimatorDesc, Axis, Camera, Light, Material, MaterialTag, Object, RelOp, Relation, SceneDesc, Surface,
    SurfaceKind, Texture, Transform3, Vec3,
};
use csgray_scene::{AllocError, Allocator, AnimatorRegistry, Block, FrameSpec, HeapAllocator, Platform};
use csgray_sched::{StaticFactory, ThreadPoolFactory, ThreadedFactory};
use csgray_simd::{FixedSubstrate, Fsaa};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Substrate with widths 1, 2 and 4 on the base variant and every FSAA
/// level up to 4x.
pub fn substrate() -> FixedSubstrate {
    FixedSubstrate::new(&[(1, 1), (2, 1), (4, 1)]).with_fsaa(&[Fsaa::X2, Fsaa::X4])
}

pub fn frame() -> FrameSpec {
    FrameSpec {
        width: 40,
        height: 30,
        tile_height: 4,
    }
}

pub fn platform(threads: usize, pool: Box<dyn ThreadPoolFactory>, animators: AnimatorRegistry) -> Platform {
    Platform {
        allocator: Box::new(HeapAllocator::new()),
        pool,
        threads,
        substrate: Box::new(substrate()),
        animators,
    }
}

pub fn threaded(threads: usize) -> Platform {
    platform(threads, Box::new(ThreadedFactory), AnimatorRegistry::new())
}

pub fn inline(slices: usize) -> Platform {
    platform(slices, Box::new(StaticFactory), AnimatorRegistry::new())
}

pub fn camera_at(z: f64) -> Object {
    Object::camera(Camera::new(0xffffff, 0.2, 1.0)).with_transform(Transform3::at(0.0, 0.0, z))
}

/// Two unit spheres one unit apart; sphere 0 loses whatever lies inside
/// sphere 1.
pub fn two_spheres() -> SceneDesc {
    let mut desc = SceneDesc::new().with_color("white", 0xffffff);
    desc.root = Array::new(vec![
        Object::surface(Surface::sphere(1.0, "white")),
        Object::surface(Surface::sphere(1.0, "white")).with_transform(Transform3::at(1.0, 0.0, 0.0)),
        camera_at(-6.0),
    ])
    .with_relations(vec![Relation::new(0, RelOp::MinusOuter, 1)]);
    desc
}

/// Relations of the gallery cluster: sphere 0 is carved by sphere 1 and by
/// the accumulator of spheres 2 and 3, each of which only shows inside
/// sphere 0.
pub fn cluster_program() -> Vec<Relation> {
    vec![
        Relation::new(-1, RelOp::BoundArray, -1),
        Relation::new(0, RelOp::MinusOuter, 1),
        Relation::new(1, RelOp::MinusInner, 0),
        Relation::new(0, RelOp::MinusAccum, 2),
        Relation::new(0, RelOp::MinusAccum, 3),
        Relation::new(2, RelOp::MinusInner, 0),
        Relation::new(3, RelOp::MinusInner, 0),
    ]
}

/// A busier scene: ground plane, a bounded cluster with subtractions and
/// an accumulator, a metal ball, a spinning instance, two lights and two
/// cameras.
pub fn gallery() -> SceneDesc {
    let mut desc = SceneDesc::new()
        .with_color("red", 0xd03020)
        .with_color("blue", 0x2040c0)
        .with_color("white", 0xf0f0f0);
    desc.textures.insert(
        "tiles".into(),
        Texture::Checker {
            a: 0xffffff,
            b: 0x303030,
            scale: 1.0,
        },
    );
    desc.materials.insert("floor".into(), Material::plain("tiles"));
    desc.materials.insert(
        "mirror".into(),
        Material {
            tag: MaterialTag::Metal,
            props: [0.6, 0.8, 20.0],
            optics: [0.5, 0.0, 0.0],
            ..Material::plain("white")
        },
    );
    desc.materials.insert(
        "lamp".into(),
        Material {
            tag: MaterialTag::Light,
            ..Material::plain("white")
        },
    );

    desc.arrays.insert(
        "capsule".into(),
        Array::new(vec![
            Object::surface(
                Surface::new(SurfaceKind::Cylinder { radius: 0.4 }, "blue")
                    .clipped(Vec3::new(-1e30, -1e30, -0.8), Vec3::new(1e30, 1e30, 0.8)),
            ),
            Object::surface(Surface::sphere(0.3, "red")).with_transform(Transform3::at(0.0, 0.4, 0.0)),
        ])
        .with_relations(vec![Relation::new(0, RelOp::MinusOuter, 1)]),
    );

    let cluster = Array::new(vec![
        Object::surface(Surface::sphere(1.0, "red")),
        Object::surface(Surface::sphere(0.6, "blue")).with_transform(Transform3::at(0.7, 0.3, -0.4)),
        Object::surface(Surface::sphere(0.5, "white")).with_transform(Transform3::at(-0.6, 0.5, -0.5)),
        Object::surface(Surface::sphere(0.4, "white")).with_transform(Transform3::at(0.0, -0.7, -0.6)),
    ])
    .with_relations(cluster_program());

    desc.root = Array::new(vec![
        camera_at(-7.0).named("front"),
        Object::camera(Camera::new(0xffffff, 0.2, 1.2))
            .named("side")
            .with_transform(Transform3::at(-6.0, 1.0, 0.0).rotated(0.0, 90.0, 0.0)),
        Object::light(Light::new(0xffffff, 0.1, 1.0)).with_transform(Transform3::at(-3.0, 4.0, -4.0)),
        Object::light(Light {
            attenuation: [30.0, 1.0, 0.05, 0.0],
            ..Light::new(0xffe0c0, 0.05, 2.0)
        })
        .with_transform(Transform3::at(4.0, 3.0, -2.0)),
        Object::surface(Surface::new(SurfaceKind::Plane, "floor"))
            .with_transform(Transform3::at(0.0, -1.5, 0.0).rotated(90.0, 0.0, 0.0)),
        Object::array(cluster).named("cluster").with_transform(Transform3::at(-1.0, 0.0, 0.0)),
        Object::surface(Surface::sphere(0.7, "mirror")).with_transform(Transform3::at(1.6, -0.5, 0.5)),
        Object::instance("capsule")
            .with_transform(Transform3::at(0.5, 1.2, -1.0))
            .animated(AnimatorDesc::Spin {
                axis: Axis::Y,
                degrees_per_second: 45.0,
            }),
        Object::instance("capsule").with_transform(Transform3::at(-2.5, -1.0, -1.5).rotated(90.0, 0.0, 0.0)),
        Object::surface(Surface::sphere(0.2, "lamp"))
            .with_transform(Transform3::at(0.0, 2.0, 0.0))
            .animated(AnimatorDesc::Bob {
                axis: Axis::Y,
                amplitude: 0.3,
                period_ms: 2000.0,
            }),
    ]);
    desc
}

/// Heap allocator reporting its live byte count through a shared counter,
/// so a test can observe it after the scene took ownership.
#[derive(Debug)]
pub struct Tracked {
    inner: HeapAllocator,
    live: Arc<AtomicUsize>,
}

impl Tracked {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let live = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: HeapAllocator::new(),
                live: live.clone(),
            },
            live,
        )
    }
}

impl Allocator for Tracked {
    fn allocate(&mut self, size: usize, align: usize) -> Result<Block, AllocError> {
        let block = self.inner.allocate(size, align)?;
        self.live.store(self.inner.allocated(), Ordering::SeqCst);
        Ok(block)
    }

    fn free(&mut self, block: Block) {
        self.inner.free(block);
        self.live.store(self.inner.allocated(), Ordering::SeqCst);
    }

    fn allocated(&self) -> usize {
        self.inner.allocated()
    }
}
