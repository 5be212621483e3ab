//! mqttprobe - MQTT test client entry point
//!
//! Thin shell around the session engine: `sub` streams matching messages
//! to stdout until interrupted, `pub` sends one message and waits for its
//! acknowledgment.

use clap::{Args, Parser, Subcommand};
use mqttprobe::logging::init_default_logging;
use mqttprobe::{Session, SessionConfig, SessionEvent};
use rumqttc::v5::mqttbytes::QoS;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info, warn};

/// MQTT test client with mutual TLS
#[derive(Parser)]
#[command(name = "mqttprobe")]
#[command(about = "MQTT test client with mutual TLS and session management")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Configuration file (TOML); flags below override nothing when set
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Broker endpoint hostname
    #[arg(long, env = "MQTTPROBE_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Broker port
    #[arg(long, default_value_t = mqttprobe::DEFAULT_PORT, global = true)]
    port: u16,

    /// Device certificate (PEM)
    #[arg(long, value_name = "FILE", global = true)]
    cert: Option<PathBuf>,

    /// Device private key (PEM)
    #[arg(long, value_name = "FILE", global = true)]
    key: Option<PathBuf>,

    /// Root CA (PEM)
    #[arg(long, value_name = "FILE", global = true)]
    ca: Option<PathBuf>,

    /// Client identifier (generated when absent)
    #[arg(long, global = true)]
    client_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to topic filters and stream messages until interrupted
    Sub {
        /// Topic filters (`+` and `#` wildcards supported)
        #[arg(required = true)]
        filters: Vec<String>,

        /// Quality of service (0, 1 or 2)
        #[arg(short, long, default_value_t = 1)]
        qos: u8,

        /// Emit one JSON object per message instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Publish one message and wait for its acknowledgment
    Pub {
        /// Concrete topic (no wildcards)
        topic: String,

        /// Message payload
        payload: String,

        /// Quality of service (0, 1 or 2)
        #[arg(short, long, default_value_t = 1)]
        qos: u8,

        /// Set the retain flag
        #[arg(short, long)]
        retain: bool,
    },
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_default_logging();

    let config = match build_config(&cli.connection) {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Sub { filters, qos, json } => run_sub(config, filters, qos, json).await,
        Commands::Pub {
            topic,
            payload,
            qos,
            retain,
        } => run_pub(config, topic, payload, qos, retain).await,
        Commands::Config { show } => run_config(config, show),
    };

    if let Err(e) = result {
        error!("command failed: {e}");
        process::exit(1);
    }
}

/// Resolve the session config from a TOML file or connection flags.
fn build_config(args: &ConnectionArgs) -> Result<SessionConfig, String> {
    if let Some(path) = &args.config {
        return SessionConfig::from_toml_file(path).map_err(|e| e.to_string());
    }

    let (Some(endpoint), Some(cert), Some(key)) = (&args.endpoint, &args.cert, &args.key) else {
        return Err(
            "provide --config FILE, or all of --endpoint, --cert and --key".to_string(),
        );
    };

    let mut config = SessionConfig::new(endpoint, cert, key);
    config.port = args.port;
    config.root_ca_path = args.ca.clone();
    config.client_id = args.client_id.clone();
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn parse_qos(qos: u8) -> Result<QoS, String> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(format!("invalid QoS {other}, expected 0, 1 or 2")),
    }
}

async fn run_sub(
    config: SessionConfig,
    filters: Vec<String>,
    qos: u8,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let qos = parse_qos(qos)?;
    let mut session = Session::new(config)?;
    let mut events = session
        .take_events()
        .ok_or("session events already taken")?;

    session.connect().await?;
    for filter in &filters {
        session.subscribe(filter, qos).await?;
        info!(filter, "subscribed");
    }

    info!("streaming messages, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("interrupt received, disconnecting");
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::Message(message)) => print_message(&message, json),
                Some(SessionEvent::Interrupted { reason }) => {
                    warn!(reason = %reason, "session interrupted, resuming");
                }
                Some(SessionEvent::Resumed) => info!("session resumed"),
                Some(SessionEvent::SubscriptionRejected { filter, reason }) => {
                    error!(filter = %filter, reason = %reason, "subscription rejected by broker");
                }
                Some(SessionEvent::Disconnected) => {
                    warn!("session ended");
                    return Ok(());
                }
                Some(SessionEvent::Connected) => {}
                None => return Ok(()),
            }
        }
    }

    session.disconnect().await;
    Ok(())
}

fn print_message(message: &mqttprobe::InboundMessage, json: bool) {
    let text = std::str::from_utf8(&message.payload).ok();
    if json {
        let line = serde_json::json!({
            "received_at": message.received_at.to_rfc3339(),
            "topic": message.topic,
            "qos": message.qos as u8,
            "retain": message.retain,
            "payload": text,
            "payload_bytes": message.payload.len(),
        });
        println!("{line}");
        return;
    }

    let preview = match text {
        Some(text) => text.to_string(),
        None => format!("<{} binary bytes>", message.payload.len()),
    };
    println!(
        "{} {} qos={:?} retain={} {}",
        message.received_at.to_rfc3339(),
        message.topic,
        message.qos,
        message.retain,
        preview
    );
}

async fn run_pub(
    config: SessionConfig,
    topic: String,
    payload: String,
    qos: u8,
    retain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let qos = parse_qos(qos)?;
    let session = Session::new(config)?;

    session.connect().await?;
    let outcome = session
        .publish(&topic, payload.into_bytes(), qos, retain)
        .await;
    session.disconnect().await;

    outcome?;
    info!(topic = %topic, "published");
    Ok(())
}

fn run_config(config: SessionConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    info!("configuration is valid");
    Ok(())
}
