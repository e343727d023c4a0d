#![warn(missing_docs)]

//! Execution substrate capabilities for the csgray engine.
//!
//! The vector instruction encoder is opaque to the engine; all it exposes
//! is which width factor and sub-variant pairs it can run and which
//! antialiasing levels it offers. This crate negotiates a configuration
//! against that query and selects the lane kernel that implements it.
//!
//! # Architecture
//!
//! - [`Substrate`] - Capability query, with [`HostSubstrate`] and [`FixedSubstrate`]
//! - [`SimdConfig`] - Packed `width | variant << 8` configuration word
//! - [`negotiate()`] / [`negotiate_fsaa`] - Deterministic search ladders
//! - [`kernel`] - Width-selected packet kernels with identical output

pub mod error;
pub mod kernel;
mod config;
mod negotiate;
mod substrate;

pub use config::{Fsaa, SimdConfig};
pub use error::{Result, SimdError};
pub use kernel::{row_stride, select_kernel, LaneKernel, Rgb};
pub use negotiate::{negotiate, negotiate_fsaa};
pub use substrate::{FixedSubstrate, HostSubstrate, Substrate, VARIANT_BASE, VARIANT_EXT};
