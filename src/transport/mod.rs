//! The `transport` module is responsible for network communication with
//! downstream clients over WebSockets.
//!
//! It accepts connections, frames payloads and detects disconnects; every
//! decision about topics and replies is left to the `Relay`.

pub mod websocket;

pub use websocket::{serve, start_websocket_server};
