//! Error types for configuration negotiation.

use thiserror::Error;

use crate::SimdConfig;

/// Errors that can occur while negotiating an execution configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimdError {
    /// An explicitly pinned width or variant is not available.
    #[error("requested SIMD configuration {requested} is not supported (nearest is {nearest})")]
    Unsupported {
        /// What the caller asked for.
        requested: SimdConfig,
        /// The pair the search ladder settled on.
        nearest: SimdConfig,
    },

    /// The substrate reports no usable width/variant pair at all.
    #[error("execution substrate reports no supported configuration")]
    NoConfiguration,
}

/// Result type for negotiation.
pub type Result<T> = std::result::Result<T, SimdError>;
