//! Financial Event Explorer binary entrypoint.
//! `run` executes one fetch → classify → store batch; `serve` boots the Axum
//! explorer UI; `show` and `timeline` render the latest events file offline.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fin_event_explorer::analyze::OpenAiClient;
use fin_event_explorer::api::{self, AppState, Runner};
use fin_event_explorer::explore::{self, terminal, EventFilter, TimeWindow};
use fin_event_explorer::ingest::x_api::XApiSource;
use fin_event_explorer::metrics::Metrics;
use fin_event_explorer::store::{self, EventStore};
use fin_event_explorer::{execute_pipeline, Impact, Settings};

#[derive(Parser)]
#[command(name = "fin-event-explorer")]
#[command(about = "Turn a financial news account's posts into structured market events", long_about = None)]
struct Cli {
    /// Override OUTPUT_DIR
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, classify and store one batch of posts
    Run {
        /// X handle to analyze (with or without the @)
        #[arg(short, long)]
        username: Option<String>,
        /// Maximum number of posts to fetch (defaults to TWEET_LIMIT)
        #[arg(short, long)]
        max_tweets: Option<usize>,
    },
    /// Start the explorer web UI
    Serve {
        /// Listen address (defaults to LISTEN_ADDR)
        #[arg(short, long)]
        listen: Option<std::net::SocketAddr>,
    },
    /// Print the latest events grouped by type
    Show {
        /// Events file to print instead of the latest one
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Disable ANSI colours
        #[arg(long)]
        no_color: bool,
    },
    /// Render the latest events to an SVG timeline
    Timeline {
        /// Output path
        #[arg(short, long, default_value = "timeline_events.svg")]
        out: PathBuf,
        /// Relative window: all, 30m, 1h, 2h, 24h, 5d
        #[arg(short, long, default_value = "all")]
        window: String,
        /// Comma-separated impacts to keep (Low,Medium,High)
        #[arg(short, long)]
        impact: Option<String>,
    },
}

/// Compact fmt logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fin_event_explorer=info,tower_http=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn build_runner(settings: &Settings) -> Result<Runner> {
    settings.require_credentials()?;
    let source = XApiSource::new(settings.x_api())?;
    let classifier = OpenAiClient::new(settings.openai())?;
    Ok(Runner {
        source: Arc::new(source),
        classifier: Arc::new(classifier),
    })
}

async fn cmd_run(settings: &Settings, username: Option<String>, max: Option<usize>) -> Result<()> {
    let runner = build_runner(settings)?;
    let username = username.unwrap_or_else(|| settings.default_username.clone());
    let max = max.unwrap_or(settings.tweet_limit);
    let store = EventStore::new(&settings.store());

    let report = execute_pipeline(
        runner.source.as_ref(),
        runner.classifier.as_ref(),
        &store,
        &username,
        max,
        Utc::now(),
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_serve(settings: &Settings, listen: Option<std::net::SocketAddr>) -> Result<()> {
    let metrics = Metrics::init()?;
    let store = EventStore::new(&settings.store());
    let mut state = AppState::new(store, settings.default_username.clone(), settings.tweet_limit);
    match build_runner(settings) {
        Ok(runner) => state = state.with_runner(runner),
        Err(e) => tracing::warn!(error = %e, "pipeline disabled, explorer is read-only"),
    }

    let ui_dir = settings.ui_dir.exists().then(|| settings.ui_dir.clone());
    if ui_dir.is_none() {
        tracing::warn!(ui_dir = %settings.ui_dir.display(), "ui directory not found, serving API only");
    }

    let app = api::create_router(state, ui_dir).merge(metrics.router());
    let addr = listen.unwrap_or(settings.listen_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "explorer listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_for_display(settings: &Settings, file: Option<PathBuf>) -> Result<Option<(PathBuf, Vec<fin_event_explorer::StructuredEvent>)>> {
    match file {
        Some(path) => {
            let events = store::load_events(&path)?;
            Ok(Some((path, events)))
        }
        None => EventStore::new(&settings.store()).load_latest(),
    }
}

fn cmd_show(settings: &Settings, file: Option<PathBuf>, no_color: bool) -> Result<()> {
    let Some((path, events)) = load_for_display(settings, file)? else {
        println!("No structured events found yet. Run the pipeline first.");
        return Ok(());
    };
    println!("\nVisualization of events ({}):\n", path.display());
    let color = !no_color && std::io::stdout().is_terminal();
    let stdout = std::io::stdout();
    terminal::render_grouped(&mut stdout.lock(), &events, color)?;
    Ok(())
}

fn cmd_timeline(settings: &Settings, out: PathBuf, window: String, impact: Option<String>) -> Result<()> {
    let Some((path, events)) = load_for_display(settings, None)? else {
        println!("No events in store, nothing to plot.");
        return Ok(());
    };
    let window: TimeWindow = window.parse().map_err(anyhow::Error::msg)?;
    let impacts = impact
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Impact>())
        .collect::<Result<Vec<_>, _>>()?;
    let filter = EventFilter::default().with_window(window).with_impacts(impacts);

    let points = explore::build_points(&explore::apply(&events, &filter));
    let svg = explore::render_svg(&points, "Financial events timeline by impact");
    std::fs::write(&out, svg).with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Timeline of {} events from {} saved to: {}",
        points.len(),
        path.display(),
        out.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }

    init_tracing();
    tracing::debug!(?settings, "settings loaded");

    match cli.command {
        Commands::Run {
            username,
            max_tweets,
        } => cmd_run(&settings, username, max_tweets).await,
        Commands::Serve { listen } => cmd_serve(&settings, listen).await,
        Commands::Show { file, no_color } => cmd_show(&settings, file, no_color),
        Commands::Timeline {
            out,
            window,
            impact,
        } => cmd_timeline(&settings, out, window, impact),
    }
}
