mod scene;

use anyhow::{Context, Result};
use elevation::observer::PointDump;
use elevation::{EnforcerConfig, EnforcerKind, build_enforcer};
use log::info;
use scene::{Scene, solved_points};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene JSON with connectors, roads and constraints.
    /// Can also be set via CLOVER_SCENE env var.
    #[arg(long, env = "CLOVER_SCENE")]
    scene: PathBuf,

    /// Enforcer config JSON. Defaults are used when omitted.
    #[arg(long, env = "CLOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured strategy. Valid options:
    /// none, interpolated, diffusion
    #[arg(long)]
    strategy: Option<String>,

    /// Where to write the solved connectors as JSON (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write every solved point with its offset as CSV
    #[arg(long)]
    dump_points: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EnforcerConfig::load(path)?,
        None => EnforcerConfig::default(),
    };
    if let Some(strategy) = &args.strategy {
        config.strategy = strategy
            .parse::<EnforcerKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    let start_time = Instant::now();
    let scene = Scene::load(&args.scene)?;
    info!(
        "Loaded scene: {} connectors, {} roads",
        scene.connectors.len(),
        scene.roads.len()
    );

    let mut enforcer = build_enforcer(&config)?;
    let network = scene.register(enforcer.as_mut())?;

    info!("Enforcing with strategy {}", config.strategy);
    let mut dump = PointDump::new();
    enforcer.enforce_constraints_observed(&network, &mut dump)?;
    if let Some(delta) = dump.last_delta() {
        info!("Relaxed for {} steps, last max delta {:e}", dump.steps(), delta);
    }

    let points = solved_points(&enforcer.into_connectors());
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &points)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &points)?;
            writeln!(stdout)?;
        }
    }

    if let Some(path) = &args.dump_points {
        let file = File::create(path)
            .with_context(|| format!("creating point dump {}", path.display()))?;
        dump.write_csv(BufWriter::new(file))?;
        info!("Wrote {} points to {}", dump.records().len(), path.display());
    }

    info!("Done in {}ms", start_time.elapsed().as_millis());
    Ok(())
}
