use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{Parser, Subcommand};
use scene_demo_core::{
    AppConfig, AppContext, Clock, FrameLoop, FramePacer, HeadlessBackend, MonotonicClock, Preset,
    RunSummary, SimulatedClock,
};
use tracing_subscriber::EnvFilter;

/// How long `inspect` waits for the model and textures.
const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> scene_demo_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            preset,
            frames,
            fps,
            realtime,
            report,
        } => run(RunArgs {
            config: config.as_deref(),
            preset: preset.as_deref(),
            frames,
            fps,
            realtime,
            report: report.as_deref(),
        }),
        Commands::Inspect { config } => inspect(config.as_deref()),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&AppConfig::default())?);
            Ok(())
        }
    }
}

struct RunArgs<'a> {
    config: Option<&'a Path>,
    preset: Option<&'a Path>,
    frames: u64,
    fps: f32,
    realtime: bool,
    report: Option<&'a Path>,
}

fn run(args: RunArgs<'_>) -> scene_demo_core::Result<()> {
    tracing::info!(frames = args.frames, fps = args.fps, realtime = args.realtime, "starting run");

    let config = AppConfig::load(args.config)?;
    let preset = match args.preset {
        Some(path) => Preset::from_path(path)?,
        None => Preset::default(),
    };

    let backend = HeadlessBackend::new();
    let log = backend.log();
    let mut ctx = AppContext::assemble(config, Box::new(backend))?;

    let summary = if args.realtime {
        drive(
            FrameLoop::new(MonotonicClock::start()).with_events(preset.events),
            &mut ctx,
            args.frames,
            FramePacer::fps(args.fps),
        )
    } else {
        drive(
            FrameLoop::new(SimulatedClock::at_fps(args.fps)).with_events(preset.events),
            &mut ctx,
            args.frames,
            FramePacer::Immediate,
        )
    };

    if let Some(path) = args.report {
        std::fs::write(path, log.to_json()?)?;
        tracing::info!(path = %path.display(), records = log.len()?, "wrote frame report");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn drive<C: Clock>(
    mut frame_loop: FrameLoop<C>,
    ctx: &mut AppContext,
    frames: u64,
    mut pacer: FramePacer,
) -> RunSummary {
    frame_loop.run(ctx, frames, &mut pacer)
}

fn inspect(config: Option<&Path>) -> scene_demo_core::Result<()> {
    let config = AppConfig::load(config)?;
    let mut ctx = AppContext::assemble(config, Box::new(HeadlessBackend::new()))?;
    let placed = ctx.wait_for_assets(INSPECT_TIMEOUT);
    tracing::info!(placed, pending = ctx.assets.pending(), "loads settled");

    println!("scene: {} nodes, {} meshes", ctx.scene.len(), ctx.scene.mesh_count());
    ctx.scene.traverse(|id, depth, node| {
        let indent = "  ".repeat(depth + 1);
        match node.as_mesh() {
            Some(mesh) => println!(
                "{indent}#{} {} [{} / {}]",
                id.index(),
                node.name,
                node.kind.name(),
                mesh.material.kind_name()
            ),
            None => println!("{indent}#{} {} [{}]", id.index(), node.name, node.kind.name()),
        }
    });

    let ready = ctx.assets.textures().filter(|(_, entry)| entry.is_ready()).count();
    println!("textures: {ready} ready");
    for (handle, entry) in ctx.assets.textures() {
        println!("  {} {:?}", handle.id(), entry.state);
    }

    if let Some(shader) = ctx.scene.get(ctx.handles.flag).and_then(|node| node.shader()) {
        println!("flag uniforms:");
        for (name, value) in shader.uniforms.iter() {
            println!("  {name} = {value:?}");
        }
    }

    println!("controls:");
    for line in ctx.panel.describe() {
        println!("  {line}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Realistic-render scene demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble the scene and drive the frame loop.
    Run {
        /// JSON configuration file; built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scripted interaction to replay during the run.
        #[arg(short, long)]
        preset: Option<PathBuf>,
        /// Number of frames to render.
        #[arg(long, default_value_t = 600)]
        frames: u64,
        /// Refresh rate of the simulated clock, or the pacing rate with `--realtime`.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// Use wall-clock time and pace frames instead of simulating.
        #[arg(long)]
        realtime: bool,
        /// Write every frame record to this file as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Load every asset and print the resulting scene and controls.
    Inspect {
        /// JSON configuration file; built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration.
    Config,
}
