use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ghostrun::core::{path_length, CoordSystem};
use ghostrun::input::load_route_file;
use ghostrun::playback::{PlaybackConfig, PlaybackEngine};
use ghostrun::route::{densify, DEFAULT_MAX_SEGMENT_METERS};
use ghostrun::storage::{app_data_dir, ConfigStore, RouteStore};
use ghostrun::telemetry::{
    BroadcastPublisher, EventPublisher, LoggingSink, PositionSink, RunEvent, SerializedSink,
    SessionRegistry, TracingPublisher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Walk a device's simulated location along a route", long_about = None)]
struct Cli {
    /// Directory for saved routes and config (defaults to the app data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a route against the dry-run device until done or Ctrl-C
    Run(RunArgs),
    /// Print length and point counts of a route file
    Stats {
        #[arg(long)]
        route: PathBuf,
        #[arg(long, default_value = "wgs84")]
        coord_system: CoordSystem,
        /// Densification spacing in meters
        #[arg(long, default_value_t = DEFAULT_MAX_SEGMENT_METERS)]
        spacing: f64,
    },
    /// Manage saved routes
    #[command(subcommand)]
    Routes(RoutesCommand),
    /// Show or change the stored playback config
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Route file (CSV or JSON)
    #[arg(long, required_unless_present = "saved", conflicts_with = "saved")]
    route: Option<PathBuf>,
    /// Name of a saved route
    #[arg(long)]
    saved: Option<String>,
    /// Datum of the route file's points
    #[arg(long, default_value = "wgs84")]
    coord_system: CoordSystem,
    #[arg(long, default_value = "dry-run")]
    device: String,
    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Config fields that can be overridden from the command line
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Base speed in km/h
    #[arg(long)]
    speed: Option<f64>,
    /// Speed swing in km/h
    #[arg(long)]
    variance: Option<f64>,
    /// Maximum positional jitter in meters
    #[arg(long)]
    offset: Option<f64>,
    /// Number of passes, 0 loops until stopped
    #[arg(long)]
    loops: Option<u32>,
    /// Minimum spacing between device updates
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl ConfigOverrides {
    fn apply(&self, mut config: PlaybackConfig) -> PlaybackConfig {
        if let Some(speed) = self.speed {
            config.base_speed_kmh = speed;
        }
        if let Some(variance) = self.variance {
            config.speed_variance_kmh = variance;
        }
        if let Some(offset) = self.offset {
            config.route_offset_meters = offset;
        }
        if let Some(loops) = self.loops {
            config.loop_count = loops;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.update_interval_ms = interval_ms;
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum RoutesCommand {
    List,
    /// Import a route file under a name
    Save {
        name: String,
        #[arg(long)]
        route: PathBuf,
        #[arg(long, default_value = "wgs84")]
        coord_system: CoordSystem,
    },
    /// Delete by index as shown by `list`
    Delete { index: usize },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Set(ConfigOverrides),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .try_init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(app_data_dir);

    match cli.command {
        Command::Run(args) => run(args, data_dir).await,
        Command::Stats { route, coord_system, spacing } => stats(route, coord_system, spacing),
        Command::Routes(command) => routes(command, data_dir),
        Command::Config(command) => config(command, data_dir),
    }
}

async fn run(args: RunArgs, data_dir: PathBuf) -> Result<()> {
    let points = match (&args.route, &args.saved) {
        (Some(path), _) => load_route_file(path, args.coord_system)?,
        (None, Some(name)) => {
            let store = RouteStore::open(&data_dir)?;
            let saved = store
                .find(name)
                .with_context(|| format!("No saved route named {:?}", name))?;
            saved.points.clone()
        }
        (None, None) => anyhow::bail!("Either --route or --saved is required"),
    };

    let config = args.overrides.apply(ConfigStore::new(&data_dir).load()?);

    let sink = Arc::new(SerializedSink::new(LoggingSink::new(), Arc::new(SessionRegistry::new())));
    let event_log = TracingPublisher;
    let publisher = Arc::new(BroadcastPublisher::new(256));
    let mut events = publisher.subscribe();
    let engine = PlaybackEngine::new(sink.clone(), publisher.clone());

    let stats = engine.prepare_route(&points, DEFAULT_MAX_SEGMENT_METERS).await?;
    engine.configure(config).await?;
    info!(
        points = stats.points,
        length_m = %format!("{:.0}", stats.distance_meters),
        "Route ready"
    );
    engine.start(&args.device).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                engine.stop().await?;
                break;
            }
            event = events.recv() => match event {
                Ok((topic, event)) => {
                    let finished = matches!(event, RunEvent::Completed(_));
                    let aborted = matches!(event, RunEvent::Error { fatal: true, .. });
                    event_log.publish(&topic, event);
                    if aborted {
                        error!("Run aborted");
                        engine.stop().await?;
                    }
                    if finished || aborted {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event listener lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let status = engine.status().await;
    println!(
        "{:.0} m in {:.1} s, {} loop(s)",
        status.total_distance_meters,
        status.elapsed_time_ms as f64 / 1000.0,
        status.current_loop
    );
    println!("{} position(s) sent to {}", sink.inner().sent(), sink.name());
    for session in sink.registry().list().await {
        println!(
            "{}: {} updates, {} failures",
            session.device_id, session.positions_set, session.failures
        );
    }
    Ok(())
}

fn stats(path: PathBuf, coord_system: CoordSystem, spacing: f64) -> Result<()> {
    let points = load_route_file(&path, coord_system)?;
    let route = densify(&points, spacing)?;
    println!("points:    {}", points.len());
    println!("densified: {} at {} m", route.len(), spacing);
    println!("length:    {:.1} m", path_length(&points));
    Ok(())
}

fn routes(command: RoutesCommand, data_dir: PathBuf) -> Result<()> {
    let mut store = RouteStore::open(&data_dir)?;
    match command {
        RoutesCommand::List => {
            if store.routes().is_empty() {
                println!("no saved routes in {}", data_dir.display());
            }
            for (index, route) in store.routes().iter().enumerate() {
                println!(
                    "{:>3}  {:<24} {:>8.2} km  {:>5} pts  {}",
                    index,
                    route.name,
                    route.total_km,
                    route.points.len(),
                    route.create_time
                );
            }
        }
        RoutesCommand::Save { name, route, coord_system } => {
            let points = load_route_file(&route, coord_system)?;
            let saved = store.add(&name, points)?;
            println!("saved {:?} ({:.2} km)", saved.name, saved.total_km);
        }
        RoutesCommand::Delete { index } => {
            let removed = store.delete(index)?;
            println!("deleted {:?}", removed.name);
        }
    }
    Ok(())
}

fn config(command: ConfigCommand, data_dir: PathBuf) -> Result<()> {
    let store = ConfigStore::new(&data_dir);
    let config = match command {
        ConfigCommand::Show => store.load()?,
        ConfigCommand::Set(overrides) => {
            let config = overrides.apply(store.load()?);
            store.save(&config)?;
            config
        }
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
