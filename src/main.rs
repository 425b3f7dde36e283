use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use viera_bridge::client::SoapClientFactory;
use viera_bridge::command::CommandExecutor;
use viera_bridge::config::{default_config_path, BridgeConfig};
use viera_bridge::pairing::{PairingFlow, SetupInput, SetupOutcome};
use viera_bridge::session::DeviceSession;
use viera_bridge::shared::{EntityUpdate, UpdateKind};
use viera_bridge::wake::UdpWakeSender;

/// Name the bridge announces to TVs when requesting a PIN
const CLIENT_NAME: &str = "viera-bridge";

/// Panasonic Viera TV bridge
#[derive(Parser, Debug)]
#[command(name = "viera-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sessions for every configured TV and read commands from stdin
    Run,

    /// Pair a TV and store it in the configuration file
    Pair {
        /// IP address of the TV
        #[arg(long)]
        host: String,

        /// Control port
        #[arg(long, default_value = "55000")]
        port: String,

        /// Display name (defaults to "Panasonic Viera (<host>)")
        #[arg(long)]
        name: Option<String>,

        /// MAC address for wake-on-LAN power on
        #[arg(long)]
        mac: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = BridgeConfig::load(&path)?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    debug!("Using configuration {}", path.display());

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Pair {
            host,
            port,
            name,
            mac,
        } => {
            let input = SetupInput {
                name: name.unwrap_or_default(),
                host,
                port,
                pin: String::new(),
                mac_address: mac.unwrap_or_default(),
            };
            pair(config, &path, input).await
        }
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    if config.devices.is_empty() {
        warn!("No devices configured; run `viera-bridge pair --host <ip>` first");
    }

    let factory = Arc::new(
        SoapClientFactory::new(config.request_timeout(), CLIENT_NAME)
            .context("Failed to create vendor client")?,
    );
    let waker = Arc::new(UdpWakeSender::new());
    let executor = Arc::new(CommandExecutor::new());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<EntityUpdate>();

    // Forward state updates
    tokio::spawn(async move {
        while let Some(update) = event_rx.recv().await {
            match update.kind {
                UpdateKind::Attributes => info!(
                    "[EVENT] {} {}",
                    update.entity_id,
                    serde_json::Value::Object(update.attributes)
                ),
                UpdateKind::Options => {
                    let commands = update
                        .attributes
                        .get("simple_commands")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    info!(
                        "[OPTIONS] {} advertises {} commands",
                        update.entity_id, commands
                    );
                    debug!(
                        "[OPTIONS] {} {}",
                        update.entity_id,
                        serde_json::Value::Object(update.attributes)
                    );
                }
            }
        }
    });

    for device in &config.devices {
        let session = Arc::new(DeviceSession::new(
            device.clone(),
            factory.clone(),
            waker.clone(),
            config.session_timing(),
            event_tx.clone(),
        ));
        executor.register(session.clone()).await;

        info!(
            "[{}] Entities {} and {} ({})",
            session.log_id(),
            session.media_player_id(),
            session.remote_id(),
            session.remote_name()
        );

        tokio::spawn(async move {
            session.connect().await;
            let surface = session.surface().await;
            debug!(
                "[{}] Remote advertises {} commands",
                session.log_id(),
                surface.simple_commands().len()
            );
            if !session.start_polling().await {
                warn!("[{}] Poll task was already running", session.log_id());
            }
        });
    }

    info!("Bridge running with {} device(s)", config.devices.len());

    tokio::select! {
        result = command_loop(executor.clone()) => {
            if let Err(e) = result {
                error!("Command input failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    let sessions = executor.sessions().await;
    join_all(sessions.iter().map(|session| session.disconnect())).await;
    Ok(())
}

/// Read `<entity_id> <cmd_id> [json-params]` lines and print status codes
async fn command_loop(executor: Arc<CommandExecutor>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match parse_command_line(&line) {
            Ok((entity_id, cmd_id, params)) => executor
                .execute(&entity_id, &cmd_id, params.as_ref())
                .await
                .to_string(),
            Err(e) => format!("BAD_REQUEST {}", e),
        };

        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("Command input closed");
    Ok(())
}

fn parse_command_line(line: &str) -> Result<(String, String, Option<Value>)> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let (Some(entity_id), Some(cmd_id)) = (parts.next(), parts.next()) else {
        bail!("expected <entity_id> <cmd_id> [json-params]");
    };

    let params = match parts.next().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(serde_json::from_str(raw).context("params must be JSON")?),
        None => None,
    };

    Ok((entity_id.to_string(), cmd_id.to_string(), params))
}

async fn pair(mut config: BridgeConfig, path: &Path, mut input: SetupInput) -> Result<()> {
    let factory = Arc::new(
        SoapClientFactory::new(config.request_timeout(), CLIENT_NAME)
            .context("Failed to create vendor client")?,
    );
    let flow = PairingFlow::new(factory);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let device = loop {
        match flow.query_device(&input).await? {
            SetupOutcome::Complete(device) => break device,
            SetupOutcome::NeedsPin(form) => {
                println!("{}", form.title);
                print!("PIN: ");
                std::io::Write::flush(&mut std::io::stdout())?;

                let Some(pin) = lines.next_line().await? else {
                    bail!("No PIN entered");
                };
                input.pin = pin.trim().to_string();
            }
        }
    };

    device.validate()?;
    let identifier = device.identifier.clone();
    if config.upsert_device(device) {
        info!("Replaced existing entry {}", identifier);
    }
    config
        .save(path)
        .with_context(|| format!("Failed to store {}", identifier))?;

    println!("Paired {} (saved to {})", identifier, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let (entity, cmd, params) =
            parse_command_line("media_player.viera_tv volume {\"volume\": 20}").unwrap();
        assert_eq!(entity, "media_player.viera_tv");
        assert_eq!(cmd, "volume");
        assert_eq!(params.unwrap()["volume"], 20);

        let (_, cmd, params) = parse_command_line("  remote.viera_tv HOME  ").unwrap();
        assert_eq!(cmd, "HOME");
        assert!(params.is_none());

        assert!(parse_command_line("remote.viera_tv").is_err());
        assert!(parse_command_line("remote.viera_tv send_cmd {oops").is_err());
    }
}
