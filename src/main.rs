use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use posecam::config::ApiMode;
use posecam::detection::{
    mock, AnalysisRequest, DetectionResult, InjuryAnalyzer, TriggerSource, WebhookClient,
};
use posecam::{location, PosecamConfig, PosecamOrchestrator};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "posecam")]
#[command(about = "Pose overlay rendering and voice-triggered injury detection")]
#[command(version)]
#[command(long_about = "Runs a camera pipeline that draws a skeleton overlay over detected \
body landmarks and, on a spoken trigger phrase or key press, captures a still and posts it \
to an injury-analysis webhook. Falls back to simulated results when the webhook is unavailable.")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "posecam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Never call the webhook
    #[arg(long, help = "Simulate detection results instead of calling the webhook")]
    mock: bool,

    /// Enable single-key terminal controls
    #[arg(long, help = "Enable keyboard controls (disables voice input on stdin)")]
    keyboard: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the camera pipeline (default)
    Run,
    /// Check that the analysis webhook is reachable
    Probe,
    /// Analyze a single JPEG file
    Analyze {
        /// JPEG image to upload
        image: PathBuf,
    },
    /// Rasterize a pose overlay from a landmark file
    Render {
        /// JSON file with `landmarks` and an optional `source` geometry
        landmarks: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Canvas width (defaults to the configured display width)
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height (defaults to the configured display height)
        #[arg(long)]
        height: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting Posecam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let mut config = match PosecamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.mock {
        config.webhook.mode = ApiMode::Mock;
    }
    if args.keyboard {
        config.system.keyboard_controls = true;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let exit_code = match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await?,
        Command::Probe => probe(&config).await?,
        Command::Analyze { image } => analyze(&config, image).await?,
        Command::Render {
            landmarks,
            output,
            width,
            height,
        } => {
            let (default_width, default_height) = config.analysis.display_resolution;
            let size = (width.unwrap_or(default_width), height.unwrap_or(default_height));
            render(&config, landmarks, output, size).await?
        }
    };

    std::process::exit(exit_code);
}

async fn run(config: PosecamConfig) -> Result<i32> {
    let mut orchestrator = PosecamOrchestrator::new(config).await.map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Posecam exited with code: {}", exit_code);
    Ok(exit_code)
}

async fn probe(config: &PosecamConfig) -> Result<i32> {
    let client = WebhookClient::new(&config.webhook)?;
    info!("Probing {}", client.endpoint());

    let report = client.probe().await;
    if report.reachable {
        println!("✓ {}", report.message);
        Ok(0)
    } else {
        eprintln!("✗ {}", report.message);
        Ok(1)
    }
}

async fn analyze(config: &PosecamConfig, image: PathBuf) -> Result<i32> {
    if !tokio::fs::try_exists(&image).await? {
        anyhow::bail!("Image not found: {}", image.display());
    }

    let result = match config.webhook.mode {
        ApiMode::Mock => {
            DetectionResult::simulated(mock::assess(), TriggerSource::Manual, "mock mode")
        }
        ApiMode::Real => {
            let client = WebhookClient::new(&config.webhook)?;
            let request = AnalysisRequest {
                image_path: image,
                taken_at: Utc::now(),
                location: location::from_config(&config.capture).current(),
            };
            match client.analyze(&request).await {
                Ok(assessment) => DetectionResult::remote(assessment, TriggerSource::Manual),
                Err(e) => {
                    warn!("Webhook analysis failed, using simulated result: {}", e);
                    DetectionResult::simulated(mock::assess(), TriggerSource::Manual, e.to_string())
                }
            }
        }
    };

    println!("{}", result.message);
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to encode result")?
    );
    Ok(0)
}

#[cfg(feature = "raster")]
async fn render(
    config: &PosecamConfig,
    landmarks: PathBuf,
    output: PathBuf,
    (width, height): (u32, u32),
) -> Result<i32> {
    use posecam::frame::{ImageSourceInfo, Size};
    use posecam::overlay::{rasterize, PoseRenderer};
    use posecam::pose::LandmarkSet;

    #[derive(serde::Deserialize)]
    struct LandmarkFile {
        /// Geometry the landmark coordinates refer to; the canvas when absent
        source: Option<ImageSourceInfo>,
        landmarks: LandmarkSet,
    }

    let text = tokio::fs::read_to_string(&landmarks)
        .await
        .with_context(|| format!("Failed to read {}", landmarks.display()))?;
    let file: LandmarkFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid landmark file {}", landmarks.display()))?;

    let source = match file.source {
        Some(source) => ImageSourceInfo::new(source.width, source.height, source.mirrored)?,
        None => ImageSourceInfo::new(width, height, false)?,
    };

    let renderer = PoseRenderer::new(config.overlay.clone());
    let commands = renderer.render(
        &file.landmarks,
        source,
        Size::new(width as f32, height as f32),
    );
    info!(
        "Rendering {} landmarks as {} draw commands",
        file.landmarks.len(),
        commands.len()
    );

    let canvas = image::RgbaImage::from_pixel(width, height, image::Rgba([18, 18, 18, 255]));
    let painted = rasterize(&commands, canvas);
    painted
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Wrote {}", output.display());
    Ok(0)
}

#[cfg(not(feature = "raster"))]
async fn render(
    _config: &PosecamConfig,
    _landmarks: PathBuf,
    _output: PathBuf,
    _size: (u32, u32),
) -> Result<i32> {
    anyhow::bail!("posecam was built without the `raster` feature")
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("posecam={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .with_writer(std::io::stderr)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .with_writer(std::io::stderr)
                .boxed()
        }
    };

    // Logs go to stderr; stdin and stdout belong to the voice source and results
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Posecam Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Any key may be overridden with POSECAM_<SECTION>__<KEY> environment variables");
    println!();
    println!("{}", PosecamConfig::default().to_toml()?);
    Ok(())
}
