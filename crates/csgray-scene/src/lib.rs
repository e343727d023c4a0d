#![warn(missing_docs)]

//! Scene compilation and frame production for the csgray engine.
//!
//! A declarative [`SceneDesc`](csgray_ir::SceneDesc) is compiled once into
//! an index-addressed arena: flattened surfaces with their trim lists,
//! arrays with bounding volumes, cameras and lights. A [`Scene`] binds that
//! arena to a worker pool, a negotiated SIMD kernel and a framebuffer, and
//! then advances and renders it on demand.
//!
//! # Architecture
//!
//! - [`compiler`] - Arena construction, instancing and validation
//! - [`relation`] - Compile-time interpreter for relation programs
//! - [`render`] - Culled traversal, trimmed nearest hit and shading
//! - [`anim`] - Animator trait, built-ins and the registry
//! - [`camera`] - Camera cycling and action-driven motion
//! - [`alloc`] - Allocator interface, heap and bounded-region allocators
//! - [`config`] - Optimization flags and TOML engine configuration
//! - [`Scene`] - Update and render dispatch, runtime settings, frames
//!
//! # Example
//!
//! ```no_run
//! use csgray_ir::{Array, Camera, Object, SceneDesc, Surface, Transform3};
//! use csgray_scene::{CameraAction, FrameSpec, Platform, Scene};
//!
//! let mut desc = SceneDesc::new().with_color("red", 0xff0000);
//! desc.root = Array::new(vec![
//!     Object::camera(Camera::new(0xffffff, 0.3, 1.0)).with_transform(Transform3::at(0.0, 0.0, -5.0)),
//!     Object::surface(Surface::sphere(1.0, "red")),
//! ]);
//! let mut scene = Scene::new(&desc, FrameSpec::new(64, 48), Platform::host(4)).unwrap();
//! scene.update(0, CameraAction::None).unwrap();
//! scene.render(0).unwrap();
//! let pixels = scene.frame();
//! assert_eq!(pixels.len(), scene.x_row() * scene.height());
//! ```

pub mod alloc;
pub mod anim;
pub mod camera;
pub mod compiler;
pub mod config;
pub mod error;
pub mod relation;
pub mod render;
mod scene;
pub mod texture;

pub use alloc::{AllocError, AllocLedger, Allocator, Block, HeapAllocator, RegionAllocator};
pub use anim::{Animator, AnimatorContext, AnimatorRegistry, Bob, Spin};
pub use camera::{CameraAction, CameraRig};
pub use compiler::{compile, CompileStats, CompiledScene, Element, MAX_CAMERAS, MAX_LIGHTS};
pub use config::{AllocatorConfig, EngineConfig, Opts};
pub use error::{EngineError, Result, SceneError};
pub use scene::{FrameSink, FrameSpec, FrameView, Platform, Scene};
