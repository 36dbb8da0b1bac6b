//! buildboard CLI - Test-results dashboard in the terminal

use anyhow::{Context, Result};
use buildboard_core::{
    BuildId, Dashboard, DashboardConfig, DataSource, FetchMode, RecordSource, SeriesSet, TickFormat,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

mod error;
mod http;
mod render;

use http::{HttpSource, TimelineMode};

/// buildboard: pass/fail timelines and per-build breakdowns
#[derive(Parser, Debug)]
#[command(name = "buildboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Dashboard configuration file (JSON)
    #[arg(long, global = true, env = "BUILDBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Build records JSON file
    #[arg(long, global = true, conflicts_with = "url")]
    data_file: Option<PathBuf>,

    /// Base URL of the dashboard backend
    #[arg(long, global = true, env = "BUILDBOARD_URL")]
    url: Option<String>,

    /// Shape of the backend's timeline endpoints
    #[arg(long, global = true, value_enum, default_value = "combined")]
    timeline_mode: TimelineMode,
}

#[derive(Args, Debug)]
struct ConfigOverrides {
    /// Display width used for panel layout
    #[arg(long, global = true)]
    width: Option<f64>,

    #[arg(long, global = true, value_enum)]
    tick_format: Option<TickFormatArg>,

    #[arg(long, global = true, value_enum)]
    fetch_mode: Option<FetchModeArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TickFormatArg {
    Integer,
    General,
}

impl From<TickFormatArg> for TickFormat {
    fn from(arg: TickFormatArg) -> Self {
        match arg {
            TickFormatArg::Integer => TickFormat::Integer,
            TickFormatArg::General => TickFormat::General,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FetchModeArg {
    Parallel,
    Sequential,
}

impl From<FetchModeArg> for FetchMode {
    fn from(arg: FetchModeArg) -> Self {
        match arg {
            FetchModeArg::Parallel => FetchMode::Parallel,
            FetchModeArg::Sequential => FetchMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Passed,
    Failed,
}

impl StatusArg {
    fn series_index(self) -> usize {
        match self {
            StatusArg::Passed => SeriesSet::PASSED,
            StatusArg::Failed => SeriesSet::FAILED,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the relative and absolute timelines
    Timeline,
    /// Select a build and show its breakdowns
    Select(SelectArgs),
    /// Read build ids from stdin and show each settled selection
    Watch,
    /// Render the chart tooltip for a build
    Tooltip(TooltipArgs),
}

#[derive(Parser, Debug)]
struct SelectArgs {
    /// Build to select (defaults to the latest build)
    #[arg(short, long)]
    build: Option<String>,

    /// Print the selection state as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(Parser, Debug)]
struct TooltipArgs {
    #[arg(short, long)]
    build: String,

    #[arg(short, long, value_enum, default_value = "passed")]
    status: StatusArg,

    /// Use the absolute (count) chart instead of the percentage chart
    #[arg(long, default_value = "false")]
    absolute: bool,
}

type SharedSource = Arc<dyn DataSource>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref(), &cli.overrides)?;
    let source = open_source(&cli.source)?;
    let dashboard = Dashboard::load(source, config)
        .await
        .with_context(|| "Failed to initialize dashboard")?;

    match cli.command {
        Commands::Timeline => timeline_command(&dashboard),
        Commands::Select(args) => select_command(&dashboard, args).await,
        Commands::Watch => watch_command(dashboard).await,
        Commands::Tooltip(args) => tooltip_command(&dashboard, args),
    }
}

fn load_config(path: Option<&PathBuf>, overrides: &ConfigOverrides) -> Result<DashboardConfig> {
    let mut config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DashboardConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration: {:?}", path))?
        }
        None => DashboardConfig::default(),
    };

    if let Some(width) = overrides.width {
        config.layout.available_width = width;
    }
    if let Some(format) = overrides.tick_format {
        config.tick_format = format.into();
    }
    if let Some(mode) = overrides.fetch_mode {
        config.fetch_mode = mode.into();
    }

    config
        .validate()
        .with_context(|| "Invalid dashboard configuration")?;
    debug!("Configuration: {:?}", config);
    Ok(config)
}

fn open_source(args: &SourceArgs) -> Result<SharedSource> {
    match (&args.data_file, &args.url) {
        (Some(path), _) => {
            info!("Reading build records from {:?}", path);
            let source = RecordSource::from_file(path)
                .with_context(|| format!("Failed to read build records: {:?}", path))?;
            Ok(Arc::new(source))
        }
        (None, Some(url)) => {
            info!("Using dashboard backend at {}", url);
            let source = HttpSource::new(url, args.timeline_mode)
                .with_context(|| format!("Invalid backend URL: {}", url))?;
            Ok(Arc::new(source))
        }
        (None, None) => anyhow::bail!("Either --data-file or --url is required"),
    }
}

fn timeline_command(dashboard: &Dashboard<SharedSource>) -> Result<()> {
    println!(
        "{}",
        render::timeline(dashboard.series(), dashboard.tick_format())
    );
    Ok(())
}

async fn select_command(dashboard: &Dashboard<SharedSource>, args: SelectArgs) -> Result<()> {
    if let Some(build) = args.build {
        dashboard
            .select(BuildId::from(build.as_str()))
            .await
            .with_context(|| format!("Failed to select build {}", build))?;
    }

    let Some(state) = dashboard.selection() else {
        println!("No build selected.");
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(state.as_ref())?);
    } else {
        println!("{}", render::selection(&state));
    }
    Ok(())
}

async fn watch_command(dashboard: Dashboard<SharedSource>) -> Result<()> {
    if let Some(state) = dashboard.selection() {
        println!("{}", render::selection(&state));
    }

    let mut updates = dashboard.controller().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            println!("{}", render::selection(&state));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let build = line.trim();
        if build.is_empty() {
            continue;
        }
        in_flight.push(dashboard.controller().on_point_selected(BuildId::from(build)));
    }

    for handle in in_flight {
        if let Err(e) = handle.await {
            warn!("Selection task failed: {}", e);
        }
    }

    // Dropping the controller closes the update channel
    drop(dashboard);
    printer.await?;
    Ok(())
}

fn tooltip_command(dashboard: &Dashboard<SharedSource>, args: TooltipArgs) -> Result<()> {
    let build = BuildId::from(args.build.as_str());
    let index = args.status.series_index();
    let series = if args.absolute {
        &dashboard.series().absolute
    } else {
        &dashboard.series().relative
    };

    let Some(line) = series.series(index) else {
        anyhow::bail!("No series at index {}", index);
    };
    let Some(point) = line.find(&build) else {
        anyhow::bail!("Build {} is not on the timeline", build);
    };

    let html = if args.absolute {
        dashboard.absolute_tooltip(&line.key, &build, point.value(), index)?
    } else {
        Some(dashboard.relative_tooltip(&line.key, &build, point.value())?)
    };

    match html {
        Some(html) => println!("{}", html),
        None => info!("No tooltip content for build {}", build),
    }
    Ok(())
}
