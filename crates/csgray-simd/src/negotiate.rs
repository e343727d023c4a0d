//! Width/variant and antialiasing negotiation.
//!
//! The search ladder for a width/variant request is:
//!
//! 1. the requested pair as is;
//! 2. the requested width with the nearest supported variant;
//! 3. the requested variant with the nearest supported width;
//! 4. the nearest supported pair overall.
//!
//! Steps 2 and 3 only run for axes the caller actually set. An automatic
//! axis starts from the widest width or richest variant on offer.
//!
//! An axis the caller pinned (non-zero) must survive the search unchanged,
//! otherwise negotiation fails instead of substituting.

use crate::error::{Result, SimdError};
use crate::{Fsaa, SimdConfig, Substrate};

/// Order `values` by distance to `target`, smaller value first on ties.
fn by_nearness(mut values: Vec<u8>, target: u8) -> Vec<u8> {
    values.sort_by_key(|&v| ((v as i16 - target as i16).abs(), v));
    values
}

/// Find the effective configuration for `request`.
pub fn negotiate(substrate: &dyn Substrate, request: SimdConfig) -> Result<SimdConfig> {
    let widths = substrate.widths();
    let variants = substrate.variants();
    let (Some(&widest), Some(&richest)) = (widths.last(), variants.last()) else {
        return Err(SimdError::NoConfiguration);
    };

    let want_w = if request.width == 0 { widest } else { request.width };
    let want_v = if request.variant == 0 { richest } else { request.variant };
    let widths = by_nearness(widths, want_w);
    let variants = by_nearness(variants, want_v);

    let hold_width = || {
        variants
            .iter()
            .find(|&&v| substrate.supports(want_w, v))
            .map(|&v| SimdConfig::new(want_w, v))
    };
    let hold_variant = || {
        widths
            .iter()
            .find(|&&w| substrate.supports(w, want_v))
            .map(|&w| SimdConfig::new(w, want_v))
    };
    let any_pair = || {
        widths.iter().find_map(|&w| {
            variants
                .iter()
                .find(|&&v| substrate.supports(w, v))
                .map(|&v| SimdConfig::new(w, v))
        })
    };

    // An automatic axis has nothing to hold.
    let found = substrate
        .supports(want_w, want_v)
        .then(|| SimdConfig::new(want_w, want_v))
        .or_else(|| if request.width != 0 { hold_width() } else { None })
        .or_else(|| if request.variant != 0 { hold_variant() } else { None })
        .or_else(any_pair);
    let effective = found.ok_or(SimdError::NoConfiguration)?;

    let width_broken = request.width != 0 && effective.width != request.width;
    let variant_broken = request.variant != 0 && effective.variant != request.variant;
    if width_broken || variant_broken {
        log::warn!("SIMD request {} not honored, nearest is {}", request, effective);
        return Err(SimdError::Unsupported {
            requested: request,
            nearest: effective,
        });
    }

    log::info!("SIMD configuration {} negotiated from {}", effective, request);
    Ok(effective)
}

/// Clamp an antialiasing request to a level the substrate offers.
///
/// The highest supported level not above the request wins; only when none
/// exists does the search move upward.
pub fn negotiate_fsaa(substrate: &dyn Substrate, requested: u32) -> Fsaa {
    let want = Fsaa::from_level(requested);
    let levels = substrate.fsaa_levels();
    let effective = levels
        .iter()
        .rev()
        .find(|&&l| l <= want)
        .or_else(|| levels.iter().find(|&&l| l > want))
        .copied()
        .unwrap_or(Fsaa::Off);
    if effective != want {
        log::debug!("FSAA {:?} clamped to {:?}", want, effective);
    }
    effective
}
