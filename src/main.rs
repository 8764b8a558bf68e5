//! CLI for wsrelay
//!
//! Subcommands:
//! - `server`: run the relay
//! - `client`: connect, subscribe to a channel and print what arrives

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use wsrelay::broker::Relay;
use wsrelay::config::{DEFAULT_CONFIG_PATH, Settings, load_config_from, load_env_file};
use wsrelay::transport::start_websocket_server;
use wsrelay::upstream::{
    MemoryBackend, RedisBackend, UpstreamBackend, UpstreamManager, UpstreamMessage,
};
use wsrelay::utils::error::RelayError;
use wsrelay::utils::logging;

#[derive(Parser)]
#[command(name = "wsrelay")]
enum Command {
    /// Start the WebSocket relay
    Server {
        /// Configuration file, without extension
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Run a simple client (connects, subscribes, optionally sends a message)
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Channel to subscribe to
        #[arg(long, default_value = "test-channel")]
        channel: String,
        /// Message to relay to the channel after subscribing
        #[arg(long)]
        datum: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server { config } => {
            if let Err(e) = run_server(&config).await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            url,
            channel,
            datum,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &channel, datum).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn connect_backend(
    settings: &Settings,
    messages: mpsc::UnboundedSender<UpstreamMessage>,
) -> Result<Arc<dyn UpstreamBackend>, RelayError> {
    match settings.upstream.backend.as_str() {
        "redis" => {
            let url = settings.upstream.redis_url();
            let backend =
                RedisBackend::connect(&url, messages, settings.upstream.reconnect_backoff())
                    .await?;
            info!("Connected to Redis at {url}");
            Ok(Arc::new(backend))
        }
        "memory" => Ok(Arc::new(MemoryBackend::new(messages))),
        other => Err(RelayError::UnknownBackend(other.to_string())),
    }
}

async fn run_server(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_file = load_env_file();
    let config = match load_config_from(config_path) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.log.level);
    if let Some(path) = env_file {
        debug!("Loaded environment from {}", path.display());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let (tx, rx) = mpsc::unbounded_channel();
    let backend = connect_backend(&config, tx).await?;
    let upstream = UpstreamManager::new(backend)
        .with_retry(config.upstream.retry_policy())
        .with_call_timeout(config.upstream.call_timeout())
        .with_default_topic(config.upstream.default_topic.clone());
    let relay = Arc::new(Relay::new(upstream));

    if let Err(e) = relay.start().await {
        error!("Failed to subscribe to default channel: {e}");
    }
    {
        let relay = relay.clone();
        tokio::spawn(async move { relay.run_upstream(rx).await });
    }

    tokio::select! {
        res = start_websocket_server(&addr, relay, config.broker.max_connections) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    url: &str,
    channel: &str,
    datum: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    let subscribe = json!({ "action": "subscribe", "channel": channel });
    ws_stream
        .send(WsMessage::Text(subscribe.to_string().into()))
        .await?;

    if let Some(datum) = datum {
        let message = json!({ "action": "message", "channel": channel, "datum": datum });
        ws_stream
            .send(WsMessage::Text(message.to_string().into()))
            .await?;
    }

    loop {
        tokio::select! {
            incoming = ws_stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => println!("{text}"),
                Some(Ok(WsMessage::Binary(data))) => println!("<{} binary bytes>", data.len()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                ws_stream.close(None).await?;
                break;
            }
        }
    }

    Ok(())
}
