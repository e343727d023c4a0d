//! Lane kernels: packet-wise resolve of shaded samples into XRGB pixels.
//!
//! The kernel is chosen from the negotiated [`SimdConfig`]. Every kernel
//! evaluates the same per-pixel arithmetic in the same order, so output is
//! bit-identical across widths; only the packet size differs.

use crate::SimdConfig;

/// Linear RGB sample, nominally in `[0, 1]`.
pub type Rgb = [f32; 3];

/// Strategy for turning shaded samples into framebuffer words.
pub trait LaneKernel: Send + Sync {
    /// Configuration this kernel was built for.
    fn config(&self) -> SimdConfig;

    /// Pixels per packet.
    fn lanes(&self) -> usize;

    /// Average `samples` consecutive colors per pixel and pack them.
    ///
    /// `colors.len()` must be `out.len() * samples`.
    fn resolve(&self, colors: &[Rgb], samples: usize, out: &mut [u32]);
}

/// Pack one linear color into `0x00RRGGBB`.
#[inline]
pub fn pack_xrgb(c: Rgb) -> u32 {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    q(c[0]) << 16 | q(c[1]) << 8 | q(c[2])
}

/// Reference resolve of a single pixel.
#[inline]
pub fn resolve_pixel(samples: &[Rgb]) -> u32 {
    let mut sum = [0.0f32; 3];
    for s in samples {
        sum[0] += s[0];
        sum[1] += s[1];
        sum[2] += s[2];
    }
    let inv = 1.0 / samples.len().max(1) as f32;
    pack_xrgb([sum[0] * inv, sum[1] * inv, sum[2] * inv])
}

/// Row stride in pixels for a frame `width` wide, padded to whole packets.
pub fn row_stride(width: usize, lanes: usize) -> usize {
    let lanes = lanes.max(1);
    width.div_ceil(lanes) * lanes
}

/// `L`-lane packet kernel.
struct Packet<const L: usize> {
    config: SimdConfig,
}

impl<const L: usize> Packet<L> {
    #[inline]
    fn packet(colors: &[Rgb], samples: usize, out: &mut [u32]) {
        let mut r = [0.0f32; L];
        let mut g = [0.0f32; L];
        let mut b = [0.0f32; L];
        let n = out.len();
        for s in 0..samples {
            for lane in 0..n {
                let c = colors[lane * samples + s];
                r[lane] += c[0];
                g[lane] += c[1];
                b[lane] += c[2];
            }
        }
        let inv = 1.0 / samples.max(1) as f32;
        for lane in 0..n {
            out[lane] = pack_xrgb([r[lane] * inv, g[lane] * inv, b[lane] * inv]);
        }
    }
}

impl<const L: usize> LaneKernel for Packet<L> {
    fn config(&self) -> SimdConfig {
        self.config
    }

    fn lanes(&self) -> usize {
        L
    }

    fn resolve(&self, colors: &[Rgb], samples: usize, out: &mut [u32]) {
        debug_assert_eq!(colors.len(), out.len() * samples);
        for (i, chunk) in out.chunks_mut(L).enumerate() {
            let start = i * L * samples;
            let end = start + chunk.len() * samples;
            Self::packet(&colors[start..end], samples, chunk);
        }
    }
}

/// Build the kernel for a negotiated configuration.
///
/// Width factors other than 1, 2 and 4 fall back to the four-lane kernel
/// while still reporting the requested configuration.
pub fn select_kernel(config: SimdConfig) -> Box<dyn LaneKernel> {
    match config.width {
        2 => Box::new(Packet::<8> { config }),
        4 => Box::new(Packet::<16> { config }),
        _ => Box::new(Packet::<4> { config }),
    }
}
