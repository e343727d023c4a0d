//! Engine configuration and optimization flags.

use serde::{Deserialize, Serialize};

/// Optimization flags, a plain bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opts(pub u32);

impl Opts {
    /// No flags.
    pub const NONE: Opts = Opts(0);
    /// Run the animate phase on slice 0 only.
    pub const SERIAL_ANIMATE: Opts = Opts(1 << 0);
    /// Run the world transform phase on slice 0 only.
    pub const SERIAL_TRANSFORM: Opts = Opts(1 << 1);
    /// Run the surface state phase on slice 0 only.
    pub const SERIAL_SURFACES: Opts = Opts(1 << 2);
    /// Skip bounding-volume culling everywhere.
    pub const NO_CULLING: Opts = Opts(1 << 3);
    /// Skip shadow rays.
    pub const NO_SHADOWS: Opts = Opts(1 << 4);

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Opts) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    pub const fn with(self, other: Opts) -> Opts {
        Opts(self.0 | other.0)
    }

    /// True if update phase `phase` (1-based) is forced onto slice 0.
    pub fn serial_phase(self, phase: u16) -> bool {
        match phase {
            1 => self.contains(Opts::SERIAL_ANIMATE),
            2 => self.contains(Opts::SERIAL_TRANSFORM),
            3 => self.contains(Opts::SERIAL_SURFACES),
            _ => false,
        }
    }
}

impl std::ops::BitOr for Opts {
    type Output = Opts;

    fn bitor(self, rhs: Opts) -> Opts {
        self.with(rhs)
    }
}

/// Which allocator backs compiled buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AllocatorConfig {
    /// Process heap, optionally capped.
    Heap {
        /// Byte budget.
        #[serde(default)]
        budget: Option<usize>,
    },
    /// Bounded address range.
    Region {
        /// Range size in bytes.
        capacity: usize,
    },
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig::Heap { budget: None }
    }
}

/// Runtime settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker count; 0 picks the number of logical CPUs.
    pub threads: usize,
    /// Run every slice on the calling thread.
    pub static_mode: bool,
    /// Packed SIMD request, `width | variant << 8`; 0 for automatic.
    pub simd: u32,
    /// Antialiasing level code (0 off, 1 2x, 2 4x, 3 8x).
    pub fsaa: u32,
    /// Optimization flags.
    pub opts: Opts,
    /// Rows per render tile.
    pub tile_height: usize,
    /// Compiled buffer allocator.
    pub allocator: AllocatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            static_mode: false,
            simd: 0,
            fsaa: 0,
            opts: Opts::NONE,
            tile_height: 8,
            allocator: AllocatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Worker count with 0 resolved against the host.
    pub fn resolved_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_phases() {
        let opts = Opts::SERIAL_ANIMATE | Opts::SERIAL_SURFACES;
        assert!(opts.serial_phase(1));
        assert!(!opts.serial_phase(2));
        assert!(opts.serial_phase(3));
        assert!(!opts.serial_phase(0));
    }

    #[test]
    fn test_parse_toml() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            threads = 4
            fsaa = 2
            opts = 3

            [allocator]
            kind = "region"
            capacity = 1048576
            "#,
        )
        .unwrap();
        assert_eq!(cfg.threads, 4);
        assert_eq!(cfg.fsaa, 2);
        assert!(cfg.opts.contains(Opts::SERIAL_TRANSFORM));
        assert_eq!(cfg.tile_height, 8);
        assert_eq!(cfg.allocator, AllocatorConfig::Region { capacity: 1 << 20 });
    }

    #[test]
    fn test_parse_json() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{ "static_mode": true, "simd": 258, "allocator": { "kind": "heap", "budget": 4096 } }"#,
        )
        .unwrap();
        assert!(cfg.static_mode);
        assert_eq!(cfg.simd, 0x0102);
        assert_eq!(cfg.threads, 0);
        assert_eq!(cfg.allocator, AllocatorConfig::Heap { budget: Some(4096) });
    }

    #[test]
    fn test_defaults_roundtrip() {
        let cfg = EngineConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), cfg);
    }
}
