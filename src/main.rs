//! AirSense - air-quality sensor normalization and AI analysis
//!
//! # Usage
//!
//! ```bash
//! # Serve the API (health, analysis proxy, CSV ingest)
//! airsense serve --addr 0.0.0.0:8080
//!
//! # Normalize a feed to JSON
//! airsense ingest thingspeak --channel 12397 --clean linear --output data.json
//! airsense ingest openaq --city Delhi --parameter pm25 --parameter pm10
//! airsense ingest csv readings.csv
//!
//! # Analyze a normalized dataset (or a CSV file directly)
//! airsense analyze --input data.json --mode health --exposure-hours 4
//! ```
//!
//! # Environment Variables
//!
//! - `AIRSENSE_CONFIG`: Path to the TOML configuration file
//! - `AIRSENSE_SERVER_ADDR`: Override the server bind address
//! - `AIRSENSE_LOG_FORMAT`: Set to `json` for JSON log lines
//! - `GEMINI_API_KEY`: Provider credential for the direct tier
//! - `OPENAQ_API_KEY`: OpenAQ API key
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

use airsense::acquisition::csv_upload::SAMPLE_CSV;
use airsense::acquisition::{
    clean_dataset, CsvAdapter, CsvUpload, OpenAqAdapter, OpenAqRequest, ThingSpeakAdapter,
    ThingSpeakRequest,
};
use airsense::analysis::{PayloadBuilder, PayloadOptions};
use airsense::api::{create_app, AppState};
use airsense::config::AppConfig;
use airsense::llm::AiOrchestrator;
use airsense::processing::CleaningMethod;
use airsense::types::{AnalysisMode, AnalysisOptions, NormalizedDataset};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "airsense")]
#[command(about = "Environmental sensor normalization and resilient AI air-quality analysis")]
#[command(version)]
struct CliArgs {
    /// Emit logs as JSON lines (also via AIRSENSE_LOG_FORMAT=json)
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API
    Serve {
        /// Override the server address (default: "0.0.0.0:8080")
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Fetch or parse a source and print the normalized dataset
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Run AI analysis over a dataset and print `{result, provenance}`
    Analyze {
        /// Normalized dataset JSON, or a .csv/.txt file
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, value_enum, default_value = "forecast")]
        mode: ModeArg,
        #[arg(long)]
        forecast_hours: Option<u32>,
        #[arg(long)]
        exposure_hours: Option<f64>,
        #[arg(long)]
        outdoor_pm25: Option<f64>,
        #[arg(long)]
        room_type: Option<String>,
        /// Question for chat mode
        #[arg(long)]
        message: Option<String>,
        /// Skip the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the sample CSV upload file
    SampleCsv,

    /// Print configured capabilities (never credential values)
    Status,
}

#[derive(clap::Subcommand, Debug)]
enum IngestSource {
    /// ThingSpeak channel feed
    Thingspeak {
        #[arg(long)]
        channel: String,
        /// Read key for private channels
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        results: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// OpenAQ city measurements
    Openaq {
        #[arg(long)]
        city: String,
        /// OpenAQ parameter (repeatable); defaults from configuration
        #[arg(long = "parameter")]
        parameters: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Local CSV file
    Csv {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Gap filling: linear, forward_fill or drop
    #[arg(long)]
    clean: Option<CleaningMethod>,
    /// Write the dataset JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Forecast,
    Source,
    Health,
    Room,
    Chat,
}

impl From<ModeArg> for AnalysisMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Forecast => AnalysisMode::Forecast,
            ModeArg::Source => AnalysisMode::SourceDetection,
            ModeArg::Health => AnalysisMode::HealthRisk,
            ModeArg::Room => AnalysisMode::RoomAdvisor,
            ModeArg::Chat => AnalysisMode::Chat,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr so command output on stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn json_logging_requested(flag: bool) -> bool {
    flag || std::env::var("AIRSENSE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

// ============================================================================
// Commands
// ============================================================================

async fn run_server(config: &AppConfig, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let state = AppState::from_config(config).context("Failed to initialize AI orchestrator")?;
    let mode = if state.orchestrator.has_live_tier() { "live" } else { "dummy" };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        addr = %addr,
        mode,
        environment = ?config.deployment.environment,
        model = %config.ai.model,
        "HTTP server listening"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

fn parse_csv_file(config: &AppConfig, path: &Path) -> Result<NormalizedDataset> {
    let contents =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let dataset = CsvAdapter::new(config.server.max_upload_bytes)
        .parse(CsvUpload {
            file_name,
            contents: &contents,
        })
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(dataset)
}

async fn run_ingest(config: &AppConfig, source: IngestSource) -> Result<()> {
    let (dataset, output) = match source {
        IngestSource::Thingspeak {
            channel,
            api_key,
            results,
            output,
        } => {
            let adapter = ThingSpeakAdapter::new(&config.sources.thingspeak)?;
            let request = ThingSpeakRequest {
                channel_id: channel,
                api_key,
                results,
            };
            let dataset = adapter
                .fetch(&request)
                .await
                .context("ThingSpeak fetch failed")?;
            (dataset, output)
        }
        IngestSource::Openaq {
            city,
            parameters,
            limit,
            output,
        } => {
            let adapter = OpenAqAdapter::new(
                &config.sources.openaq,
                config.credentials.openaq_api_key.clone(),
            )?;
            let request = OpenAqRequest {
                city,
                parameters,
                limit,
            };
            let dataset = adapter.fetch(&request).await.context("OpenAQ fetch failed")?;
            (dataset, output)
        }
        IngestSource::Csv { path, output } => (parse_csv_file(config, &path)?, output),
    };

    let dataset = match output.clean {
        Some(method) => clean_dataset(dataset, method),
        None => dataset,
    };

    let json = serde_json::to_string_pretty(&dataset)?;
    match output.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                entries = dataset.time_series.len(),
                "Dataset written"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load_dataset(config: &AppConfig, path: &Path) -> Result<NormalizedDataset> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv") || e.eq_ignore_ascii_case("txt"));
    if is_csv {
        return parse_csv_file(config, path);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a normalized dataset", path.display()))
}

async fn run_analyze(config: &AppConfig, command: SubCommand) -> Result<()> {
    let SubCommand::Analyze {
        input,
        mode,
        forecast_hours,
        exposure_hours,
        outdoor_pm25,
        room_type,
        message,
        no_cache,
    } = command
    else {
        return Ok(());
    };

    let dataset = load_dataset(config, &input)?;
    let payload = PayloadBuilder::build(
        mode.into(),
        &dataset,
        PayloadOptions {
            options: AnalysisOptions {
                forecast_hours,
                exposure_hours,
                outdoor_pm25,
                room_type,
                message,
            },
            ..PayloadOptions::default()
        },
    );

    let orchestrator =
        AiOrchestrator::from_config(config).context("Failed to initialize AI orchestrator")?;
    let outcome = if no_cache {
        orchestrator.analyze_uncached(&payload).await
    } else {
        orchestrator.analyze(&payload).await
    };

    info!("{}", orchestrator.stats().await);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(json_logging_requested(args.log_json));

    let config = AppConfig::load();

    match args.command {
        None => run_server(&config, None).await,
        Some(SubCommand::Serve { addr }) => run_server(&config, addr).await,
        Some(SubCommand::Ingest { source }) => run_ingest(&config, source).await,
        Some(command @ SubCommand::Analyze { .. }) => run_analyze(&config, command).await,
        Some(SubCommand::SampleCsv) => {
            print!("{SAMPLE_CSV}");
            Ok(())
        }
        Some(SubCommand::Status) => {
            println!("{}", serde_json::to_string_pretty(&config.capabilities())?);
            Ok(())
        }
    }
}
