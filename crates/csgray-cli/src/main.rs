//! csgray CLI - offline renderer for CSG scene descriptions
//!
//! Loads a JSON scene, runs it through the engine for a number of frames
//! and writes each frame as a PNG.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use csgray_ir::SceneDesc;
use csgray_scene::{CameraAction, EngineConfig, FrameSpec, Opts, Platform, Scene};

mod sink;

use sink::PngSink;

#[derive(Parser)]
#[command(name = "csgray")]
#[command(about = "Multi-threaded CSG ray tracer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames of a scene to PNG files
    Render {
        /// Scene description (.json)
        scene: PathBuf,
        /// Engine configuration (.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "frames")]
        out: PathBuf,
        /// Frame width in pixels
        #[arg(long, default_value_t = 640)]
        width: usize,
        /// Frame height in pixels
        #[arg(long, default_value_t = 480)]
        height: usize,
        /// Number of frames
        #[arg(short, long, default_value_t = 1)]
        frames: u64,
        /// Milliseconds between frames
        #[arg(long, default_value_t = 40)]
        step_ms: i64,
        /// Worker threads (overrides the config; 0 for all CPUs)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Run every slice on the main thread
        #[arg(long = "static")]
        static_mode: bool,
        /// Antialiasing level (0 off, 1 2x, 2 4x, 3 8x)
        #[arg(long)]
        fsaa: Option<u32>,
        /// Packed SIMD request, width | variant << 8 (0 for automatic)
        #[arg(long)]
        simd: Option<u32>,
        /// Camera index to start from
        #[arg(long, default_value_t = 0)]
        camera: usize,
        /// Camera motion applied on every frame
        #[arg(long, value_enum, default_value_t = Motion::None)]
        motion: Motion,
        /// Disable shadow rays
        #[arg(long)]
        no_shadows: bool,
    },
    /// Compile a scene and print its statistics
    Info {
        /// Scene description (.json)
        scene: PathBuf,
    },
    /// Print the default engine configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Motion {
    None,
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
    TurnLeft,
    TurnRight,
    TiltUp,
    TiltDown,
}

impl From<Motion> for CameraAction {
    fn from(m: Motion) -> Self {
        match m {
            Motion::None => CameraAction::None,
            Motion::Forward => CameraAction::Forward,
            Motion::Back => CameraAction::Back,
            Motion::Left => CameraAction::Left,
            Motion::Right => CameraAction::Right,
            Motion::Up => CameraAction::Up,
            Motion::Down => CameraAction::Down,
            Motion::TurnLeft => CameraAction::TurnLeft,
            Motion::TurnRight => CameraAction::TurnRight,
            Motion::TiltUp => CameraAction::TiltUp,
            Motion::TiltDown => CameraAction::TiltDown,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            scene,
            config,
            out,
            width,
            height,
            frames,
            step_ms,
            threads,
            static_mode,
            fsaa,
            simd,
            camera,
            motion,
            no_shadows,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(t) = threads {
                cfg.threads = t;
            }
            cfg.static_mode |= static_mode;
            if let Some(level) = fsaa {
                cfg.fsaa = level;
            }
            if let Some(word) = simd {
                cfg.simd = word;
            }
            if no_shadows {
                cfg.opts = cfg.opts | Opts::NO_SHADOWS;
            }
            let job = RenderJob {
                width,
                height,
                frames,
                step_ms,
                camera,
                action: motion.into(),
            };
            render(&scene, &cfg, &job, &out)?;
        }
        Commands::Info { scene } => {
            show_info(&scene)?;
        }
        Commands::Config => {
            print!("{}", EngineConfig::default().to_toml_string()?);
        }
    }

    Ok(())
}

struct RenderJob {
    width: usize,
    height: usize,
    frames: u64,
    step_ms: i64,
    camera: usize,
    action: CameraAction,
}

fn load_scene(path: &Path) -> Result<SceneDesc> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SceneDesc::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    EngineConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn render(scene_path: &Path, cfg: &EngineConfig, job: &RenderJob, out: &Path) -> Result<()> {
    let desc = load_scene(scene_path)?;
    let frame = FrameSpec {
        width: job.width,
        height: job.height,
        tile_height: cfg.tile_height,
    };
    let mut scene = Scene::new(&desc, frame, Platform::from_config(cfg))?;

    let simd = scene.set_simd(cfg.simd)?;
    let fsaa = scene.set_fsaa(cfg.fsaa);
    scene.set_opts(cfg.opts);
    if job.camera >= scene.cam_count() {
        anyhow::bail!("camera {} out of range ({} cameras)", job.camera, scene.cam_count());
    }
    while scene.cam_index() != job.camera {
        scene.next_cam();
    }
    log::info!(
        "{}x{} with {} workers, simd {:#06x}, fsaa {}",
        job.width,
        job.height,
        cfg.resolved_threads(),
        simd,
        fsaa
    );

    let mut sink = PngSink::new(out, "frame_");
    for seq in 0..job.frames {
        let time = seq as i64 * job.step_ms;
        scene.update(time, job.action)?;
        scene.render(time)?;
        scene.save_frame(seq, &mut sink)?;
    }
    println!("Wrote {} frame(s) to {}", sink.written().len(), out.display());
    Ok(())
}

fn show_info(path: &Path) -> Result<()> {
    let desc = load_scene(path)?;
    // Smallest frame; only the compile statistics matter here.
    let scene = Scene::new(&desc, FrameSpec::new(1, 1), Platform::from_config(&EngineConfig::default()))?;
    let stats = scene.stats();

    println!("Scene: {}", path.display());
    println!("  Objects:   {}", stats.objects);
    println!("  Surfaces:  {}", stats.surfaces);
    println!("  Arrays:    {}", stats.arrays);
    println!("  Cameras:   {}", stats.cameras);
    println!("  Lights:    {}", stats.lights);
    println!("  Trims:     {}", stats.trims);
    println!("  Materials: {}", scene.compiled().materials.len());
    println!("  Textures:  {}", scene.compiled().textures.len());
    println!("  Allocated: {} bytes", stats.bytes);
    println!("  SIMD:      {}", scene.simd());
    println!("  FSAA:      {:?}", scene.fsaa());

    for (i, cam) in scene.compiled().cameras.iter().enumerate() {
        println!("  camera {i}: {}", scene.compiled().objects[cam.object].path);
    }
    Ok(())
}
