//! Resolved textures and texture-space mapping.

use std::f64::consts::TAU;

use csgray_ir::{SurfaceKind, Texture, Transform2};
use csgray_math::Point3;
use csgray_simd::Rgb;

use crate::error::SceneError;

/// Unpack `0xRRGGBB` into linear `[0, 1]` components.
pub fn unpack_rgb(rgb: u32) -> Rgb {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    ]
}

/// A texture ready for sampling.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureMap {
    /// Solid color.
    Color(Rgb),
    /// Checkerboard with square cells of side `scale`.
    Checker {
        /// Even cells.
        a: Rgb,
        /// Odd cells.
        b: Rgb,
        /// Cell size.
        scale: f64,
    },
    /// Decoded image, sampled nearest-neighbor and tiled.
    Image {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Row-major texels.
        texels: Vec<Rgb>,
    },
}

impl TextureMap {
    /// Resolve a declared texture, decoding image files.
    pub fn load(texture: &Texture) -> Result<Self, SceneError> {
        Ok(match texture {
            Texture::Color { rgb } => TextureMap::Color(unpack_rgb(*rgb)),
            Texture::Checker { a, b, scale } => TextureMap::Checker {
                a: unpack_rgb(*a),
                b: unpack_rgb(*b),
                scale: if *scale > 0.0 { *scale } else { 1.0 },
            },
            Texture::Image { path } => {
                let img = image::open(path)
                    .map_err(|e| SceneError::TextureLoad {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?
                    .to_rgb8();
                let (width, height) = img.dimensions();
                if width == 0 || height == 0 {
                    return Err(SceneError::TextureLoad {
                        path: path.clone(),
                        reason: "image is empty".to_string(),
                    });
                }
                let texels = img
                    .pixels()
                    .map(|p| [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0])
                    .collect();
                TextureMap::Image {
                    width: width as usize,
                    height: height as usize,
                    texels,
                }
            }
        })
    }

    /// Color at texture coordinate `(u, v)`.
    pub fn sample(&self, u: f64, v: f64) -> Rgb {
        match self {
            TextureMap::Color(c) => *c,
            TextureMap::Checker { a, b, scale } => {
                let parity = ((u / scale).floor() as i64 + (v / scale).floor() as i64).rem_euclid(2);
                if parity == 0 {
                    *a
                } else {
                    *b
                }
            }
            TextureMap::Image { width, height, texels } => {
                let x = ((u.rem_euclid(1.0) * *width as f64) as usize).min(width - 1);
                let y = ((v.rem_euclid(1.0) * *height as f64) as usize).min(height - 1);
                texels[y * width + x]
            }
        }
    }
}

/// Texture coordinate of a local hit point, before the side mapping.
///
/// Planes use their own x/y; everything else wraps the angle around the
/// z axis into `u` and uses height as `v`.
pub fn surface_uv(kind: &SurfaceKind, local: &Point3) -> (f64, f64) {
    match kind {
        SurfaceKind::Plane => (local.x, local.y),
        _ => (local.y.atan2(local.x) / TAU + 0.5, local.z),
    }
}

/// Apply a side's texture mapping to a texture coordinate.
pub fn apply_map(map: &Transform2, (u, v): (f64, f64)) -> (f64, f64) {
    let (s, c) = (-map.rotation).to_radians().sin_cos();
    let du = u - map.position.x;
    let dv = v - map.position.y;
    let ru = du * c - dv * s;
    let rv = du * s + dv * c;
    let sx = if map.scale.x != 0.0 { map.scale.x } else { 1.0 };
    let sy = if map.scale.y != 0.0 { map.scale.y } else { 1.0 };
    (ru / sx, rv / sy)
}
