use anyhow::Result;
use clap::Parser;
use eyepi::app::shutdown_signal;
use eyepi::{
    build_cameras, Camera, ConfigWatcher, DeviceWatcher, EyepiConfig, EyepiOrchestrator,
    FileCameraSource, MetricsSink, ShutdownReason, TelegrafSink,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "eyepi")]
#[command(about = "Periodic image capture from gphoto2 and Raspberry Pi cameras")]
#[command(version)]
#[command(long_about = "Captures still images from USB cameras driven by gphoto2 and from the \
Raspberry Pi board camera on independent, wall-clock aligned intervals. Restarts all capture \
loops when the configuration file is written or the set of attached USB devices changes.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/eyepi/eyepi.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without capturing")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - list cameras but don't schedule captures
    #[arg(long, help = "Load configuration, list cameras and exit without capturing")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting eyepi v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match EyepiConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            if args.validate_config {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
            return Err(e.into());
        }
    };

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if args.dry_run {
        let lock = eyepi::camera::new_capture_lock();
        for camera in build_cameras(&config, &lock).await {
            println!(
                "{}\n\tenabled: {}\n\tinterval: {}",
                camera.name(),
                camera.is_enabled(),
                eyepi::config::format_duration(camera.interval())
            );
        }
        println!("✓ Dry run completed - no captures scheduled");
        return Ok(());
    }

    let sink: Option<Box<dyn MetricsSink>> = match TelegrafSink::connect(&config.metrics_socket).await
    {
        Ok(sink) => Some(Box::new(sink)),
        Err(e) => {
            error!("Measurements will not be recorded: {}", e);
            None
        }
    };

    let source = Arc::new(FileCameraSource::new(&args.config));
    let mut orchestrator = EyepiOrchestrator::new(source, sink);
    let cameras = build_cameras(&config, &orchestrator.capture_lock()).await;
    orchestrator.start_with(cameras);

    let background = CancellationToken::new();
    let device_signal = orchestrator.device_signal();
    let device_watcher = DeviceWatcher::usb(config.device_poll_interval.as_duration());
    tokio::spawn(device_watcher.watch(
        move |_change| {
            if !device_signal.notify() {
                debug!("Device change already pending");
            }
        },
        background.clone(),
    ));

    let (_config_watcher, config_writes) = ConfigWatcher::new(&args.config).map_err(|e| {
        error!("Failed to watch {}: {}", args.config, e);
        e
    })?;

    let result = orchestrator.run(config_writes, shutdown_signal()).await;
    background.cancel();

    let exit_code = match result {
        Ok(ShutdownReason::Signal(signal)) => {
            info!("Stopped by {}", signal);
            0
        }
        Ok(ShutdownReason::Error(message)) => {
            error!("Stopped on error: {}", message);
            1
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            1
        }
    };

    info!("eyepi exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eyepi={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# eyepi configuration file");
    println!("# Durations use Go-style units: \"500ms\", \"30s\", \"10m\", \"1h30m\"");
    println!();

    let default_config = r#"# chrono strftime layout used in image file names
timestamp_format = "%Y_%m_%d_%H_%M_%S"
# Output directories default to <base_dir>/<filename_prefix>
base_dir = "/var/lib/eyepi"
# How often the USB device tree is polled for changes
# Read once at startup; restart eyepi to change it
device_poll_interval = "5s"
# Telegraf socket_listener receiving capture timings
# Read once at startup; restart eyepi to change it
metrics_socket = "/tmp/telegraf.sock"
# Font used to stamp the time onto last_image.jpg
timestamp_font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
timestamp_font_size = 150.0
# IANA timezone for the stamped time (local time when unset)
# timestamp_timezone = "Australia/Canberra"

[picamera]
enable = true
# Intervals of one second or less are replaced with 10m
interval = "5m"
# Defaults to <hostname>-Picam
# filename_prefix = ""
# output_dir = ""
# jpg, tiff, bmp, png or gif
image_types = ["jpg", "tiff"]

# One table per gphoto2 camera, keyed by a short name
# [gphoto.canon]
# enable = true
# interval = "10m"
# serial_number = "cd6acfa090894f9bbe7b21037a49389b"
# Defaults to <hostname>-canon
# filename_prefix = ""
# output_dir = ""
"#;

    println!("{}", default_config);
}
