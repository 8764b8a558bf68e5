use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wsrelay::broker::Relay;
use wsrelay::transport::serve;
use wsrelay::upstream::{MemoryBackend, UpstreamManager};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_TOPIC: &str = "test-channel";

struct Harness {
    addr: SocketAddr,
    relay: Arc<Relay>,
    backend: Arc<MemoryBackend>,
}

impl Harness {
    async fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(MemoryBackend::new(tx));
        let upstream = UpstreamManager::new(backend.clone()).with_default_topic(DEFAULT_TOPIC);
        let relay = Arc::new(Relay::new(upstream));
        relay.start().await.expect("default topic subscribe");
        {
            let relay = relay.clone();
            tokio::spawn(async move { relay.run_upstream(rx).await });
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, relay.clone(), 100));
        Self {
            addr,
            relay,
            backend,
        }
    }

    async fn client(&self) -> Ws {
        let (mut ws, _) = connect_async(format!("ws://{}", self.addr))
            .await
            .expect("WebSocket handshake failed");
        assert_eq!(recv(&mut ws).await, "Welcome to the WebSocket server!");
        ws
    }
}

async fn send(ws: &mut Ws, json: &str) {
    ws.send(WsMessage::text(json.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("read error");
    frame.into_text().unwrap().as_str().to_string()
}

async fn assert_silent(ws: &mut Ws) {
    let next = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

#[tokio::test]
async fn shared_topic_is_subscribed_upstream_while_anyone_listens() {
    let h = Harness::start().await;
    let mut c1 = h.client().await;
    let mut c2 = h.client().await;
    let sub = r#"{"action":"subscribe","channel":"alerts"}"#;
    let unsub = r#"{"action":"unsubscribe","channel":"alerts"}"#;

    send(&mut c1, sub).await;
    assert_eq!(recv(&mut c1).await, "Subscribed to channel: alerts");
    assert!(h.backend.is_subscribed("alerts"));

    send(&mut c2, sub).await;
    assert_eq!(recv(&mut c2).await, "Subscribed to channel: alerts");

    send(&mut c1, unsub).await;
    assert_eq!(recv(&mut c1).await, "Unsubscribed from channel: alerts");
    assert!(h.backend.is_subscribed("alerts"));

    send(&mut c2, unsub).await;
    assert_eq!(recv(&mut c2).await, "Unsubscribed from channel: alerts");
    assert!(!h.backend.is_subscribed("alerts"));
    assert!(h.relay.topics().await.is_empty());
}

#[tokio::test]
async fn upstream_messages_reach_only_topic_subscribers() {
    let h = Harness::start().await;
    let mut listener = h.client().await;
    let mut bystander = h.client().await;
    send(&mut listener, r#"{"action":"subscribe","channel":"prices"}"#).await;
    recv(&mut listener).await;

    assert!(h.backend.publish("prices", r#"{"btc":1}"#));

    assert_eq!(recv(&mut listener).await, r#"{"btc":1}"#);
    assert_silent(&mut bystander).await;
}

#[tokio::test]
async fn client_messages_are_relayed_within_the_channel() {
    let h = Harness::start().await;
    let mut alice = h.client().await;
    let mut bob = h.client().await;
    let mut carol = h.client().await;
    send(&mut alice, r#"{"action":"subscribe","channel":"room"}"#).await;
    recv(&mut alice).await;
    send(&mut bob, r#"{"action":"subscribe","channel":"room"}"#).await;
    recv(&mut bob).await;

    send(&mut alice, r#"{"action":"message","channel":"room","datum":"hi bob"}"#).await;

    let expected = r#"{"action":"message","channel":"room","datum":"hi bob"}"#;
    assert_eq!(recv(&mut alice).await, expected);
    assert_eq!(recv(&mut bob).await, expected);
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn message_without_datum_is_rejected() {
    let h = Harness::start().await;
    let mut alice = h.client().await;
    let mut bob = h.client().await;
    send(&mut bob, r#"{"action":"subscribe","channel":"alerts"}"#).await;
    recv(&mut bob).await;

    send(&mut alice, r#"{"action":"message","channel":"alerts"}"#).await;

    assert_eq!(recv(&mut alice).await, "Missing message content");
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn default_topic_reaches_every_client() {
    let h = Harness::start().await;
    let mut subscribed = h.client().await;
    let mut idle = h.client().await;
    send(&mut subscribed, &format!(r#"{{"action":"subscribe","channel":"{DEFAULT_TOPIC}"}}"#)).await;
    recv(&mut subscribed).await;

    assert!(h.backend.publish(DEFAULT_TOPIC, "hello everyone"));

    assert_eq!(recv(&mut subscribed).await, "hello everyone");
    assert_eq!(recv(&mut idle).await, "hello everyone");
    assert_silent(&mut subscribed).await;
}

#[tokio::test]
async fn abrupt_disconnect_releases_upstream_subscriptions() {
    let h = Harness::start().await;
    let mut ws = h.client().await;
    for channel in ["x", "y"] {
        send(&mut ws, &format!(r#"{{"action":"subscribe","channel":"{channel}"}}"#)).await;
        recv(&mut ws).await;
    }
    assert_eq!(h.backend.active_topics(), vec![DEFAULT_TOPIC, "x", "y"]);

    drop(ws);

    for _ in 0..200 {
        if h.backend.active_topics() == vec![DEFAULT_TOPIC.to_string()] {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("upstream still subscribed: {:?}", h.backend.active_topics());
}
