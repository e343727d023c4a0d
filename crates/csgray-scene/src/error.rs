//! Error types for scene construction and per-frame operation.

use thiserror::Error;

use crate::alloc::AllocError;
use csgray_sched::DispatchError;
use csgray_simd::SimdError;

/// Errors raised while building a [`Scene`](crate::Scene).
#[derive(Error, Debug)]
pub enum SceneError {
    /// A relation step cannot be applied.
    #[error("malformed relation {index} in array {array}: {reason}")]
    MalformedRelation {
        /// Path of the array owning the program.
        array: String,
        /// Position of the step in the program.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A relation operand position does not hold a surface.
    #[error("position {position} in array {array} is not a surface")]
    NotASurface {
        /// Path of the array owning the program.
        array: String,
        /// Element position.
        position: usize,
    },

    /// A side references a material that does not exist.
    #[error("unresolved material {name:?} used by {path}")]
    UnresolvedMaterial {
        /// Material key.
        name: String,
        /// Object path of the referencing surface.
        path: String,
    },

    /// A material references a texture that does not exist.
    #[error("unresolved texture {name:?} used by material {material:?}")]
    UnresolvedTexture {
        /// Texture key.
        name: String,
        /// Referencing material.
        material: String,
    },

    /// An image texture could not be loaded.
    #[error("failed to load texture {path:?}: {reason}")]
    TextureLoad {
        /// File path.
        path: String,
        /// Decoder message.
        reason: String,
    },

    /// The allocator refused a compiled buffer.
    #[error("allocator exhausted while allocating {what}: {source}")]
    AllocatorExhausted {
        /// Buffer being allocated.
        what: &'static str,
        /// Allocator error.
        #[source]
        source: AllocError,
    },

    /// More cameras than [`MAX_CAMERAS`](crate::MAX_CAMERAS).
    #[error("too many cameras: {count} exceeds the limit of {max}")]
    TooManyCameras {
        /// Cameras found.
        count: usize,
        /// Limit.
        max: usize,
    },

    /// More lights than [`MAX_LIGHTS`](crate::MAX_LIGHTS).
    #[error("too many lights: {count} exceeds the limit of {max}")]
    TooManyLights {
        /// Lights found.
        count: usize,
        /// Limit.
        max: usize,
    },

    /// The scene has nowhere to look from.
    #[error("scene has no camera")]
    NoCamera,

    /// A custom animator name is not registered.
    #[error("unknown animator {name:?} on {path}")]
    UnknownAnimator {
        /// Registry key.
        name: String,
        /// Object path.
        path: String,
    },

    /// An instance references a missing library array.
    #[error("unknown array {name:?} instanced at {path}")]
    UnknownArray {
        /// Library key.
        name: String,
        /// Object path.
        path: String,
    },

    /// A library array instances itself, directly or indirectly.
    #[error("array {name:?} instances itself at {path}")]
    RecursiveInstance {
        /// Library key.
        name: String,
        /// Object path.
        path: String,
    },

    /// A surface clip interval has `min > max` on some axis.
    #[error("invalid clip bounds on {path}: {reason}")]
    InvalidBounds {
        /// Object path.
        path: String,
        /// Which axis failed.
        reason: String,
    },

    /// The frame geometry is unusable.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Initial configuration negotiation failed.
    #[error(transparent)]
    Simd(#[from] SimdError),

    /// The worker pool could not be created.
    #[error("failed to create worker pool: {0}")]
    Pool(#[source] DispatchError),
}

/// Errors raised by per-frame operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A dispatch finished with worker failures.
    #[error(transparent)]
    Dispatch(DispatchError),

    /// A previous failure must be acknowledged first.
    #[error("previous dispatch failure has not been acknowledged")]
    Unacknowledged,

    /// Writing a frame failed.
    #[error("failed to save frame {seq}: {source}")]
    Sink {
        /// Frame sequence number.
        seq: u64,
        /// Sink error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<DispatchError> for EngineError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Unacknowledged => EngineError::Unacknowledged,
            other => EngineError::Dispatch(other),
        }
    }
}

/// Result type for scene construction.
pub type Result<T> = std::result::Result<T, SceneError>;
