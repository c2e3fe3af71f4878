use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use mask_bridge_lib::config::Config;
use mask_bridge_lib::image_source;
use mask_bridge_lib::serial::{BridgeConfig, ClassificationResult, ClassificationSummary, SerialInterface};
use mask_bridge_lib::{ExchangeOutcome, ProtocolBridge};

#[derive(Debug, Default)]
struct Args {
    port: Option<String>,
    baud: Option<u32>,
    image: Option<PathBuf>,
    timeout_secs: Option<u64>,
    config: Option<PathBuf>,
    list: bool,
}

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    scores: ClassificationResult,
    #[serde(flatten)]
    summary: ClassificationSummary,
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: mask-bridge [--port <port>] [--baud <rate>] [--image <file>] [--timeout <secs>] [--config <file>]");
            eprintln!("       mask-bridge --list");
            eprintln!();
            eprintln!("Sends one image to the board and prints its verdict as JSON.");
            eprintln!("Without --image a generated test pattern is sent.");
            process::exit(2);
        }
    };

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String, String> {
            i += 1;
            args.get(i).cloned().ok_or_else(|| format!("{flag} requires a value"))
        };
        match flag {
            "--port" | "-p" => parsed.port = Some(value()?),
            "--baud" | "-b" => {
                let raw = value()?;
                parsed.baud = Some(raw.parse().map_err(|_| format!("invalid baud rate: {raw}"))?);
            }
            "--image" | "-i" => parsed.image = Some(PathBuf::from(value()?)),
            "--timeout" | "-t" => {
                let raw = value()?;
                let secs: u64 = raw.parse().map_err(|_| format!("invalid timeout: {raw}"))?;
                if secs == 0 {
                    return Err("timeout must be at least 1 second".to_string());
                }
                parsed.timeout_secs = Some(secs);
            }
            "--config" | "-c" => parsed.config = Some(PathBuf::from(value()?)),
            "--list" => parsed.list = true,
            "--help" | "-h" => return Err(String::new()),
            other => return Err(format!("unexpected argument: {other}")),
        }
        i += 1;
    }

    Ok(parsed)
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// The one-shot tool waits longer than the server path unless the flag or
/// the config file sets a budget.
fn response_budget(timeout_secs: Option<u64>, config: &Config) -> Duration {
    match timeout_secs {
        Some(secs) => Duration::from_secs(secs),
        None => config.response_timeout_or(BridgeConfig::STANDALONE_RESPONSE_TIMEOUT),
    }
}

fn run(args: Args) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config.logging.level);

    if args.list {
        let devices = SerialInterface::discover_devices().context("listing serial ports")?;
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(true);
    }

    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }

    let response_timeout = response_budget(args.timeout_secs, &config);

    let shape = config.image_shape();
    let image = match &args.image {
        Some(path) => match image_source::load_image(path, shape) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("{e}; falling back to the test pattern");
                image_source::test_pattern(shape)
            }
        },
        None => {
            log::info!("No image given, sending the test pattern");
            image_source::test_pattern(shape)
        }
    };

    let mut interface = SerialInterface::new();
    interface
        .connect(&config.serial.port, &config.connection_settings())
        .with_context(|| format!("opening {}", config.serial.port))?;

    let mut bridge = ProtocolBridge::new(interface, config.bridge_config().with_response_timeout(response_timeout));
    let outcome = bridge.exchange_with_progress(image.pixels(), shape.width, shape.height, shape.channels, |p| {
        eprint!("\rSent: {}/{} bytes", p.sent, p.total);
        if p.is_complete() {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    });
    bridge.interface_mut().disconnect();

    match outcome {
        ExchangeOutcome::Success(scores) => {
            let report = Report { scores, summary: scores.summary() };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        ExchangeOutcome::Timeout { last_line } => {
            eprintln!(
                "error: board did not answer within {}s (last line: {})",
                response_timeout.as_secs(),
                last_line.as_deref().unwrap_or("<none>")
            );
            Ok(false)
        }
        ExchangeOutcome::ProtocolError(e) => {
            eprintln!("error: {e}");
            Ok(false)
        }
    }
}
