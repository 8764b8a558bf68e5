//! WebSocket transport
//!
//! Minimal server translating WebSocket frames into relay calls:
//! - Accept TCP/WebSocket connections, refusing them past `max_connections`
//! - Create a `Client` per connection and register it with the `Relay`
//! - Run a writer task draining the client's channel into the socket
//! - Feed text and binary frames to `Relay::handle_request`
//! - Tear the connection down in the relay when either side ends

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::broker::Relay;
use crate::client::Client;
use crate::utils::error::RelayError;

pub async fn start_websocket_server(
    addr: &str,
    relay: Arc<Relay>,
    max_connections: usize,
) -> Result<(), RelayError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!("WebSocket server running on ws://{addr}");

    serve(listener, relay, max_connections).await;
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, relay: Arc<Relay>, max_connections: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Accepted TCP connection from {peer}");
                spawn(handle_connection(stream, relay.clone(), max_connections));
            }
            Err(e) => {
                error!("Failed to accept connection: {e}");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, relay: Arc<Relay>, max_connections: usize) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    let client_id = client.id.clone();
    if !relay.try_connect(client, max_connections) {
        let frame = CloseFrame {
            code: CloseCode::Again,
            reason: "server is full".into(),
        };
        let _ = ws_stream.close(Some(frame)).await;
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // relay -> client. Ends when the relay drops the client or the socket fails.
    {
        let relay = relay.clone();
        let client_id = client_id.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }
            let _ = ws_sender.close().await;
            relay.disconnect(&client_id).await;
            debug!("Send loop closed for {client_id}");
        });
    }

    // client -> relay
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => relay.handle_request(&client_id, text.as_bytes()).await,
            Ok(WsMessage::Binary(data)) => relay.handle_request(&client_id, &data).await,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read error from {client_id}: {e}");
                break;
            }
        }
    }

    relay.disconnect(&client_id).await;
}
