//! Execution substrate capability queries.

use std::fmt;

use crate::Fsaa;

/// Baseline variant every width offers.
pub const VARIANT_BASE: u8 = 1;
/// Variant with fused multiply-add or the widest extension set for a width.
pub const VARIANT_EXT: u8 = 2;

/// What the vector execution substrate can run.
///
/// The negotiator only ever asks these four questions; the actual
/// instruction selection stays behind the substrate.
pub trait Substrate: Send + Sync + fmt::Debug {
    /// True if the width/variant pair is available.
    fn supports(&self, width: u8, variant: u8) -> bool;

    /// Every width factor with at least one supported variant, ascending.
    fn widths(&self) -> Vec<u8>;

    /// Every variant supported at some width, ascending.
    fn variants(&self) -> Vec<u8>;

    /// Supported antialiasing levels, ascending.
    fn fsaa_levels(&self) -> Vec<Fsaa>;
}

/// A substrate defined by an explicit list of supported pairs.
#[derive(Debug, Clone)]
pub struct FixedSubstrate {
    pairs: Vec<(u8, u8)>,
    fsaa: Vec<Fsaa>,
}

impl FixedSubstrate {
    /// Substrate supporting exactly `pairs`, with every FSAA level.
    pub fn new(pairs: &[(u8, u8)]) -> Self {
        let mut pairs: Vec<(u8, u8)> = pairs.iter().copied().filter(|&(w, v)| w > 0 && v > 0).collect();
        pairs.sort_unstable();
        pairs.dedup();
        Self {
            pairs,
            fsaa: Fsaa::ALL.to_vec(),
        }
    }

    /// Only the portable four-lane baseline.
    pub fn scalar() -> Self {
        Self::new(&[(1, VARIANT_BASE)])
    }

    /// Restrict the antialiasing levels on offer. `Off` is always kept.
    pub fn with_fsaa(mut self, levels: &[Fsaa]) -> Self {
        let mut fsaa: Vec<Fsaa> = levels.to_vec();
        fsaa.push(Fsaa::Off);
        fsaa.sort_unstable();
        fsaa.dedup();
        self.fsaa = fsaa;
        self
    }
}

impl Substrate for FixedSubstrate {
    fn supports(&self, width: u8, variant: u8) -> bool {
        self.pairs.binary_search(&(width, variant)).is_ok()
    }

    fn widths(&self) -> Vec<u8> {
        let mut w: Vec<u8> = self.pairs.iter().map(|p| p.0).collect();
        w.dedup();
        w
    }

    fn variants(&self) -> Vec<u8> {
        let mut v: Vec<u8> = self.pairs.iter().map(|p| p.1).collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    fn fsaa_levels(&self) -> Vec<Fsaa> {
        self.fsaa.clone()
    }
}

/// The host CPU, probed once at construction.
#[derive(Debug, Clone)]
pub struct HostSubstrate {
    inner: FixedSubstrate,
}

impl HostSubstrate {
    /// Probe the running CPU for vector extensions.
    pub fn detect() -> Self {
        let pairs = detect_pairs();
        log::debug!("host substrate pairs: {:?}", pairs);
        Self {
            inner: FixedSubstrate::new(&pairs),
        }
    }
}

impl Substrate for HostSubstrate {
    fn supports(&self, width: u8, variant: u8) -> bool {
        self.inner.supports(width, variant)
    }

    fn widths(&self) -> Vec<u8> {
        self.inner.widths()
    }

    fn variants(&self) -> Vec<u8> {
        self.inner.variants()
    }

    fn fsaa_levels(&self) -> Vec<Fsaa> {
        self.inner.fsaa_levels()
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_pairs() -> Vec<(u8, u8)> {
    let mut pairs = vec![(1, VARIANT_BASE)];
    if is_x86_feature_detected!("sse4.1") {
        pairs.push((1, VARIANT_EXT));
    }
    if is_x86_feature_detected!("avx") {
        pairs.push((2, VARIANT_BASE));
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            pairs.push((2, VARIANT_EXT));
        }
    }
    if is_x86_feature_detected!("avx512f") {
        pairs.push((4, VARIANT_BASE));
        if is_x86_feature_detected!("avx512dq") {
            pairs.push((4, VARIANT_EXT));
        }
    }
    pairs
}

#[cfg(target_arch = "aarch64")]
fn detect_pairs() -> Vec<(u8, u8)> {
    let mut pairs = vec![(1, VARIANT_BASE)];
    if std::arch::is_aarch64_feature_detected!("neon") {
        pairs.push((1, VARIANT_EXT));
        pairs.push((2, VARIANT_BASE));
    }
    pairs
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn detect_pairs() -> Vec<(u8, u8)> {
    vec![(1, VARIANT_BASE)]
}
