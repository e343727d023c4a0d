//! The scene facade: construction, per-frame update and render, runtime
//! configuration and frame access.
//!
//! A [`Scene`] owns the compiled arena, a worker pool built by the
//! platform's [`ThreadPoolFactory`] and the framebuffer. Update runs three
//! phases on the pool (animate, world transforms, surface placement) and
//! then publishes an immutable [`WorldSnapshot`]; render reads only that
//! snapshot plus the current settings, so its output depends on nothing
//! but scene, time and options.

use std::error::Error;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use csgray_ir::{SceneDesc, Transform3};
use csgray_math::{Aabb3, Point3, Transform};
use csgray_sched::tiles::{slice_range, tile_bands};
use csgray_sched::{SliceError, SliceRunner, Scheduler, StaticFactory, ThreadPoolFactory, ThreadedFactory};
use csgray_simd::{
    negotiate, negotiate_fsaa, row_stride, select_kernel, Fsaa, HostSubstrate, LaneKernel, Rgb, SimdConfig,
    SimdError, Substrate,
};
use csgray_trace::{Ray, RayHit, SurfacePose};

use crate::alloc::{AllocLedger, Allocator, HeapAllocator, RegionAllocator};
use crate::anim::{AnimatorContext, AnimatorRegistry};
use crate::camera::{apply_action, CameraAction, CameraRig};
use crate::compiler::{compile, placement, CompileStats, CompiledScene};
use crate::config::{AllocatorConfig, EngineConfig, Opts};
use crate::error::{EngineError, Result, SceneError};
use crate::render::{CameraView, LightView, Tracer, WorldSnapshot};

/// Widest packet any kernel uses, in pixels.
const MAX_LANES: usize = 16;

/// Frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Rows per render tile.
    pub tile_height: usize,
}

impl FrameSpec {
    /// Frame of `width` by `height` with 8-row tiles.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tile_height: 8,
        }
    }
}

/// Collaborators a scene needs from its host.
pub struct Platform {
    /// Backs compiled buffers and the framebuffer.
    pub allocator: Box<dyn Allocator>,
    /// Builds the worker pool.
    pub pool: Box<dyn ThreadPoolFactory>,
    /// Worker count.
    pub threads: usize,
    /// Execution substrate queried for SIMD and FSAA support.
    pub substrate: Box<dyn Substrate>,
    /// Custom animators.
    pub animators: AnimatorRegistry,
}

impl Platform {
    /// Heap allocator, barrier pool of `threads` workers, detected host.
    pub fn host(threads: usize) -> Self {
        Self {
            allocator: Box::new(HeapAllocator::new()),
            pool: Box::new(ThreadedFactory),
            threads: threads.max(1),
            substrate: Box::new(HostSubstrate::detect()),
            animators: AnimatorRegistry::new(),
        }
    }

    /// Platform described by an engine configuration, on the detected host.
    pub fn from_config(config: &EngineConfig) -> Self {
        let allocator: Box<dyn Allocator> = match config.allocator {
            AllocatorConfig::Heap { budget: Some(b) } => Box::new(HeapAllocator::with_budget(b)),
            AllocatorConfig::Heap { budget: None } => Box::new(HeapAllocator::new()),
            AllocatorConfig::Region { capacity } => Box::new(RegionAllocator::new(capacity)),
        };
        let pool: Box<dyn ThreadPoolFactory> = if config.static_mode {
            Box::new(StaticFactory)
        } else {
            Box::new(ThreadedFactory)
        };
        Self {
            allocator,
            pool,
            threads: config.resolved_threads(),
            substrate: Box::new(HostSubstrate::detect()),
            animators: AnimatorRegistry::new(),
        }
    }

    /// Replace the animator registry.
    pub fn with_animators(mut self, animators: AnimatorRegistry) -> Self {
        self.animators = animators;
        self
    }

    /// Replace the substrate.
    pub fn with_substrate(mut self, substrate: Box<dyn Substrate>) -> Self {
        self.substrate = substrate;
        self
    }
}

/// Borrowed view of the framebuffer handed to a [`FrameSink`].
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Visible width.
    pub width: usize,
    /// Height.
    pub height: usize,
    /// Row stride in pixels.
    pub x_row: usize,
    /// Row-major XRGB pixels, `x_row * height` long.
    pub pixels: &'a [u32],
}

impl FrameView<'_> {
    /// Visible pixels of row `y`.
    pub fn row(&self, y: usize) -> &[u32] {
        let start = y * self.x_row;
        &self.pixels[start..start + self.width]
    }

    /// Pixel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.x_row + x]
    }
}

/// Destination for saved frames.
pub trait FrameSink {
    /// Store frame number `seq`.
    fn write_frame(&mut self, seq: u64, frame: &FrameView<'_>) -> std::result::Result<(), Box<dyn Error + Send + Sync>>;
}

// =============================================================================
// Shared state
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct ObjectState {
    transform: Transform3,
    last_time: i64,
    world: Transform,
}

struct RenderSettings {
    kernel: Box<dyn LaneKernel>,
    fsaa: Fsaa,
    opts: Opts,
    tile_height: usize,
}

struct FrameBuffer {
    x_row: usize,
    pixels: Vec<AtomicU32>,
}

impl FrameBuffer {
    fn new(x_row: usize, height: usize) -> Self {
        Self {
            x_row,
            pixels: (0..x_row * height).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

/// State reached by every worker. Per-object and per-surface cells are
/// written only by the slice owning that index within a phase.
struct SceneShared {
    compiled: CompiledScene,
    width: usize,
    height: usize,
    time: AtomicI64,
    camera: AtomicUsize,
    objects: Vec<Mutex<ObjectState>>,
    poses: Vec<Mutex<Option<SurfacePose>>>,
    snapshot: RwLock<Arc<WorldSnapshot>>,
    settings: RwLock<RenderSettings>,
    frame: RwLock<FrameBuffer>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

impl SceneShared {
    fn animate(&self, range: std::ops::Range<usize>, time: i64) {
        for i in range {
            let node = &self.compiled.objects[i];
            let Some(animator) = &node.animator else {
                continue;
            };
            let mut state = lock(&self.objects[i]);
            let ctx = AnimatorContext {
                object: i,
                base: &node.transform,
                created: node.time,
            };
            let last = state.last_time;
            animator.animate(time, last, &mut state.transform, &ctx);
            state.last_time = time;
        }
    }

    fn resolve_world(&self, range: std::ops::Range<usize>) {
        for i in range {
            let mut chain = vec![i];
            let mut cursor = self.compiled.objects[i].parent;
            while let Some(p) = cursor {
                chain.push(p);
                cursor = self.compiled.objects[p].parent;
            }
            let world = chain
                .iter()
                .rev()
                .fold(Transform::identity(), |acc, &o| acc.then(&placement(&lock(&self.objects[o]).transform)));
            lock(&self.objects[i]).world = world;
        }
    }

    fn place_surfaces(&self, range: std::ops::Range<usize>) {
        for s in range {
            let node = &self.compiled.surfaces[s];
            let world = lock(&self.objects[node.object]).world;
            *lock(&self.poses[s]) = SurfacePose::new(node.quadric, node.clip, &node.local_bounds, world);
        }
    }

    fn world_of(&self, object: usize) -> Transform {
        lock(&self.objects[object]).world
    }

    /// Freeze the per-item state into a new snapshot. Array bounds are
    /// rebuilt from the current transforms so animated members stay inside
    /// their array's volume.
    fn publish(&self) {
        let compiled = &self.compiled;
        let snapshot = WorldSnapshot {
            poses: self.poses.iter().map(|p| *lock(p)).collect(),
            array_bounds: compiled
                .array_volumes(|o| placement(&lock(&self.objects[o]).transform))
                .into_iter()
                .zip(&compiled.arrays)
                .map(|((local, _), a)| match a.object {
                    Some(o) => local.transformed(&self.world_of(o)),
                    None => local,
                })
                .collect(),
            cameras: compiled
                .cameras
                .iter()
                .map(|c| CameraView {
                    to_world: self.world_of(c.object),
                    camera: c.camera,
                })
                .collect(),
            lights: compiled
                .lights
                .iter()
                .map(|l| LightView {
                    position: self.world_of(l.object).apply_point(&Point3::origin()),
                    light: l.light,
                })
                .collect(),
        };
        *write(&self.snapshot) = Arc::new(snapshot);
    }

    fn current(&self) -> Arc<WorldSnapshot> {
        read(&self.snapshot).clone()
    }

    fn opts(&self) -> Opts {
        read(&self.settings).opts
    }
}

impl SliceRunner for SceneShared {
    fn update_slice(&self, index: usize, count: usize, phase: u16) -> std::result::Result<(), SliceError> {
        let total = match phase {
            1 | 2 => self.objects.len(),
            3 => self.poses.len(),
            other => return Err(SliceError::Failed(format!("unknown update phase {other}"))),
        };
        let range = if self.opts().serial_phase(phase) {
            if index != 0 {
                return Ok(());
            }
            0..total
        } else {
            slice_range(index, count, total)
        };
        match phase {
            1 => self.animate(range, self.time.load(Ordering::Acquire)),
            2 => self.resolve_world(range),
            _ => self.place_surfaces(range),
        }
        Ok(())
    }

    fn render_slice(&self, index: usize, count: usize, _phase: u16) -> std::result::Result<(), SliceError> {
        let world = self.current();
        let settings = read(&self.settings);
        let frame = read(&self.frame);
        let view = world
            .cameras
            .get(self.camera.load(Ordering::Acquire))
            .ok_or_else(|| SliceError::Failed("current camera out of range".to_string()))?;
        let tracer = Tracer::new(&self.compiled, &world, settings.opts);
        let offsets = settings.fsaa.offsets();
        let samples = offsets.len();

        let mut colors: Vec<Rgb> = Vec::with_capacity(self.width * samples);
        let mut row = vec![0u32; self.width];
        for band in tile_bands(index, count, self.height, settings.tile_height) {
            for y in band {
                colors.clear();
                for x in 0..self.width {
                    for &(ox, oy) in offsets {
                        colors.push(tracer.sample(view, x as f64 + ox, y as f64 + oy, self.width, self.height));
                    }
                }
                settings.kernel.resolve(&colors, samples, &mut row);
                let base = y * frame.x_row;
                for (x, &px) in row.iter().enumerate() {
                    frame.pixels[base + x].store(px, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scene
// =============================================================================

/// A compiled scene bound to a worker pool and a framebuffer.
pub struct Scene {
    scheduler: Option<Scheduler>,
    shared: Arc<SceneShared>,
    ledger: AllocLedger,
    allocator: Box<dyn Allocator>,
    substrate: Box<dyn Substrate>,
    simd: SimdConfig,
    rig: CameraRig,
    last_update: Option<i64>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("width", &self.shared.width)
            .field("height", &self.shared.height)
            .field("simd", &self.simd)
            .field("camera", &self.rig.cam_index())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Scene {
    /// Compile `desc` and bind it to a pool and a framebuffer.
    ///
    /// The SIMD configuration starts fully automatic and antialiasing off.
    /// On failure every allocation made so far is returned to the platform
    /// allocator.
    pub fn new(desc: &SceneDesc, frame: FrameSpec, platform: Platform) -> Result<Self> {
        if frame.width == 0 || frame.height == 0 {
            return Err(SceneError::InvalidFrame(format!("{}x{} frame", frame.width, frame.height)));
        }
        if frame.tile_height == 0 {
            return Err(SceneError::InvalidFrame("tile height must be positive".to_string()));
        }
        let Platform {
            mut allocator,
            pool,
            threads,
            substrate,
            animators,
        } = platform;

        let mut compiled = compile(desc, &animators, allocator.as_mut())?;
        let mut ledger = std::mem::take(&mut compiled.ledger);
        match Self::assemble(compiled, frame, &mut ledger, allocator.as_mut(), pool.as_ref(), threads, substrate.as_ref())
        {
            Ok((scheduler, shared, simd)) => {
                let rig = CameraRig::new(shared.compiled.cameras.len());
                log::info!(
                    "scene ready: {}x{}, {} workers, simd {}, {} bytes reserved",
                    frame.width,
                    frame.height,
                    scheduler.threads(),
                    simd,
                    ledger.bytes()
                );
                Ok(Self {
                    scheduler: Some(scheduler),
                    shared,
                    ledger,
                    allocator,
                    substrate,
                    simd,
                    rig,
                    last_update: None,
                })
            }
            Err(e) => {
                ledger.release_all(allocator.as_mut());
                Err(e)
            }
        }
    }

    fn assemble(
        compiled: CompiledScene,
        frame: FrameSpec,
        ledger: &mut AllocLedger,
        allocator: &mut dyn Allocator,
        pool: &dyn ThreadPoolFactory,
        threads: usize,
        substrate: &dyn Substrate,
    ) -> Result<(Scheduler, Arc<SceneShared>, SimdConfig)> {
        let simd = negotiate(substrate, SimdConfig::AUTO)?;
        let kernel = select_kernel(simd);
        let x_row = row_stride(frame.width, kernel.lanes());
        // Sized for the widest packet so a later set_simd never grows it.
        ledger.acquire::<u32>(allocator, "frame buffer", row_stride(frame.width, MAX_LANES) * frame.height)?;

        let objects = compiled
            .objects
            .iter()
            .map(|o| {
                Mutex::new(ObjectState {
                    transform: o.transform,
                    last_time: o.time,
                    world: Transform::identity(),
                })
            })
            .collect();
        let poses = (0..compiled.surfaces.len()).map(|_| Mutex::new(None)).collect();
        let shared = Arc::new(SceneShared {
            compiled,
            width: frame.width,
            height: frame.height,
            time: AtomicI64::new(0),
            camera: AtomicUsize::new(0),
            objects,
            poses,
            snapshot: RwLock::new(Arc::new(WorldSnapshot::default())),
            settings: RwLock::new(RenderSettings {
                kernel,
                fsaa: Fsaa::Off,
                opts: Opts::NONE,
                tile_height: frame.tile_height,
            }),
            frame: RwLock::new(FrameBuffer::new(x_row, frame.height)),
        });

        // Initial placement, before any worker exists.
        shared.resolve_world(0..shared.objects.len());
        shared.place_surfaces(0..shared.poses.len());
        shared.publish();

        let runner: Arc<dyn SliceRunner> = shared.clone();
        let pool = pool.create(threads.max(1), runner).map_err(SceneError::Pool)?;
        Ok((Scheduler::new(pool), shared, simd))
    }

    fn scheduler(&mut self) -> std::result::Result<&mut Scheduler, EngineError> {
        self.scheduler.as_mut().ok_or(EngineError::Unacknowledged)
    }

    /// Advance the scene to `time` (milliseconds), moving the current
    /// camera by `action` over the time elapsed since the last update.
    pub fn update(&mut self, time: i64, action: CameraAction) -> std::result::Result<(), EngineError> {
        if self.scheduler()?.is_blocked() {
            return Err(EngineError::Unacknowledged);
        }
        if action != CameraAction::None {
            let seconds = self.last_update.map_or(0.0, |last| (time - last).max(0) as f64 / 1000.0);
            let cam = &self.shared.compiled.cameras[self.rig.cam_index()];
            let mut state = lock(&self.shared.objects[cam.object]);
            apply_action(&mut state.transform, &cam.camera, action, seconds);
        }
        self.last_update = Some(time);
        self.shared.time.store(time, Ordering::Release);
        self.scheduler()?.update()?;
        self.shared.publish();
        Ok(())
    }

    /// Render the state published by the last [`update`](Self::update)
    /// into the framebuffer.
    ///
    /// Output depends only on that state and the current settings; `time`
    /// is accepted so callers can drive update and render with the same
    /// clock, and is otherwise unused.
    pub fn render(&mut self, _time: i64) -> std::result::Result<(), EngineError> {
        self.scheduler()?.render()?;
        Ok(())
    }

    /// Clear a latched dispatch failure. Returns true if one was pending.
    pub fn acknowledge(&mut self) -> bool {
        self.scheduler.as_mut().is_some_and(|s| s.acknowledge())
    }

    /// True while a dispatch failure awaits acknowledgement.
    pub fn is_blocked(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.is_blocked())
    }

    /// Negotiate a packed SIMD request and switch kernels.
    ///
    /// Returns the effective packed configuration. An explicitly pinned
    /// axis that cannot be honored is an error and leaves the scene as it
    /// was.
    pub fn set_simd(&mut self, packed: u32) -> std::result::Result<u32, SimdError> {
        let effective = negotiate(self.substrate.as_ref(), SimdConfig::unpack(packed))?;
        if effective != self.simd {
            let kernel = select_kernel(effective);
            let x_row = row_stride(self.shared.width, kernel.lanes());
            write(&self.shared.settings).kernel = kernel;
            let mut frame = write(&self.shared.frame);
            if frame.x_row != x_row {
                *frame = FrameBuffer::new(x_row, self.shared.height);
            }
            self.simd = effective;
        }
        Ok(effective.pack())
    }

    /// Clamp an antialiasing request to a supported level and apply it.
    /// Returns the effective level code.
    pub fn set_fsaa(&mut self, level: u32) -> u32 {
        let fsaa = negotiate_fsaa(self.substrate.as_ref(), level);
        write(&self.shared.settings).fsaa = fsaa;
        fsaa.level()
    }

    /// Effective SIMD configuration.
    pub fn simd(&self) -> SimdConfig {
        self.simd
    }

    /// Effective antialiasing level.
    pub fn fsaa(&self) -> Fsaa {
        read(&self.shared.settings).fsaa
    }

    /// Optimization flags.
    pub fn opts(&self) -> Opts {
        self.shared.opts()
    }

    /// Replace the optimization flags.
    pub fn set_opts(&mut self, opts: Opts) {
        write(&self.shared.settings).opts = opts;
    }

    /// Switch to the next camera, wrapping around. Returns its index.
    pub fn next_cam(&mut self) -> usize {
        let index = self.rig.next_cam();
        self.shared.camera.store(index, Ordering::Release);
        index
    }

    /// Current camera index.
    pub fn cam_index(&self) -> usize {
        self.rig.cam_index()
    }

    /// Number of cameras.
    pub fn cam_count(&self) -> usize {
        self.rig.len()
    }

    /// Frame width.
    pub fn width(&self) -> usize {
        self.shared.width
    }

    /// Frame height.
    pub fn height(&self) -> usize {
        self.shared.height
    }

    /// Row stride in pixels.
    pub fn x_row(&self) -> usize {
        read(&self.shared.frame).x_row
    }

    /// Copy of the framebuffer, `x_row() * height()` XRGB words.
    pub fn frame(&self) -> Vec<u32> {
        read(&self.shared.frame)
            .pixels
            .iter()
            .map(|p| p.load(Ordering::Relaxed))
            .collect()
    }

    /// Hand the current frame to `sink` as number `seq`.
    pub fn save_frame(&self, seq: u64, sink: &mut dyn FrameSink) -> std::result::Result<(), EngineError> {
        let pixels = self.frame();
        let view = FrameView {
            width: self.shared.width,
            height: self.shared.height,
            x_row: self.x_row(),
            pixels: &pixels,
        };
        sink.write_frame(seq, &view)
            .map_err(|source| EngineError::Sink { seq, source })
    }

    /// Nearest hit along a world-space ray in the last published state.
    pub fn trace(&self, ray: &Ray) -> Option<RayHit> {
        let world = self.shared.current();
        Tracer::new(&self.shared.compiled, &world, self.opts()).nearest(ray, f64::INFINITY)
    }

    /// Nearest hit through the center of pixel `(x, y)` from the current
    /// camera.
    pub fn trace_pixel(&self, x: usize, y: usize) -> Option<RayHit> {
        let world = self.shared.current();
        let view = world.cameras.get(self.rig.cam_index())?;
        let ray = view.primary_ray(x as f64 + 0.5, y as f64 + 0.5, self.shared.width, self.shared.height);
        Tracer::new(&self.shared.compiled, &world, self.opts()).nearest(&ray, f64::INFINITY)
    }

    /// World bounding volume of array `id` in the last published state.
    pub fn array_bounds(&self, id: usize) -> Option<Aabb3> {
        self.shared.current().array_bounds.get(id).copied()
    }

    /// Compiled arena.
    pub fn compiled(&self) -> &CompiledScene {
        &self.shared.compiled
    }

    /// Compile statistics, with the framebuffer reservation included.
    pub fn stats(&self) -> CompileStats {
        CompileStats {
            bytes: self.ledger.bytes(),
            ..self.shared.compiled.stats()
        }
    }

    /// Bytes currently held from the platform allocator.
    pub fn allocated(&self) -> usize {
        self.allocator.allocated()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        // Workers hold the shared state; stop them before freeing anything.
        drop(self.scheduler.take());
        self.ledger.release_all(self.allocator.as_mut());
        log::debug!("scene released, allocator holds {} bytes", self.allocator.allocated());
    }
}
