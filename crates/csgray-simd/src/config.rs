//! Packed configuration words.

use std::fmt;

/// Vector width factor and sub-variant, packed as `width | variant << 8`.
///
/// A zero on either axis means "no preference". Width factor `w` processes
/// `4 * w` pixels per packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SimdConfig {
    /// Width factor, 0 for automatic.
    pub width: u8,
    /// Sub-variant, 0 for automatic.
    pub variant: u8,
}

impl SimdConfig {
    /// Let the negotiator choose both axes.
    pub const AUTO: Self = Self { width: 0, variant: 0 };

    /// Build a configuration from its two axes.
    pub const fn new(width: u8, variant: u8) -> Self {
        Self { width, variant }
    }

    /// Decode a packed word. Bits above the variant byte are ignored.
    pub const fn unpack(word: u32) -> Self {
        Self {
            width: (word & 0xff) as u8,
            variant: ((word >> 8) & 0xff) as u8,
        }
    }

    /// Encode as `width | variant << 8`.
    pub const fn pack(self) -> u32 {
        self.width as u32 | (self.variant as u32) << 8
    }

    /// Pixels processed per packet.
    pub const fn lanes(self) -> usize {
        4 * self.width as usize
    }

    /// True when neither axis is pinned.
    pub const fn is_auto(self) -> bool {
        self.width == 0 && self.variant == 0
    }
}

impl fmt::Display for SimdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}v{} ({:#06x})", self.width, self.variant, self.pack())
    }
}

/// Full-scene antialiasing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Fsaa {
    /// One sample per pixel.
    #[default]
    Off,
    /// Two samples per pixel.
    X2,
    /// Four samples per pixel.
    X4,
    /// Eight samples per pixel.
    X8,
}

const OFFSETS_1: [(f64, f64); 1] = [(0.5, 0.5)];
const OFFSETS_2: [(f64, f64); 2] = [(0.25, 0.25), (0.75, 0.75)];
// Rotated grid
const OFFSETS_4: [(f64, f64); 4] = [(0.375, 0.125), (0.875, 0.375), (0.625, 0.875), (0.125, 0.625)];
const OFFSETS_8: [(f64, f64); 8] = [
    (0.5625, 0.3125),
    (0.4375, 0.6875),
    (0.8125, 0.5625),
    (0.3125, 0.1875),
    (0.1875, 0.8125),
    (0.0625, 0.4375),
    (0.6875, 0.9375),
    (0.9375, 0.0625),
];

impl Fsaa {
    /// Every level, ascending.
    pub const ALL: [Fsaa; 4] = [Fsaa::Off, Fsaa::X2, Fsaa::X4, Fsaa::X8];

    /// Level from its numeric code (0 off, 1 2x, 2 4x, 3 8x). Codes past the
    /// ladder saturate at 8x.
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => Fsaa::Off,
            1 => Fsaa::X2,
            2 => Fsaa::X4,
            _ => Fsaa::X8,
        }
    }

    /// Numeric code of this level.
    pub fn level(self) -> u32 {
        self as u32
    }

    /// Samples taken per pixel.
    pub fn samples(self) -> usize {
        1 << self.level()
    }

    /// Sub-pixel sample positions in `[0, 1)^2`.
    pub fn offsets(self) -> &'static [(f64, f64)] {
        match self {
            Fsaa::Off => &OFFSETS_1,
            Fsaa::X2 => &OFFSETS_2,
            Fsaa::X4 => &OFFSETS_4,
            Fsaa::X8 => &OFFSETS_8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let c = SimdConfig::new(2, 3);
        assert_eq!(c.pack(), 0x0302);
        assert_eq!(SimdConfig::unpack(0x0302), c);
        assert_eq!(SimdConfig::unpack(0xff_0104), SimdConfig::new(4, 1));
        assert_eq!(c.lanes(), 8);
    }

    #[test]
    fn test_fsaa_levels() {
        assert_eq!(Fsaa::from_level(0), Fsaa::Off);
        assert_eq!(Fsaa::from_level(3), Fsaa::X8);
        assert_eq!(Fsaa::from_level(9), Fsaa::X8);
        for f in Fsaa::ALL {
            assert_eq!(f.offsets().len(), f.samples());
            assert_eq!(Fsaa::from_level(f.level()), f);
        }
    }
}
