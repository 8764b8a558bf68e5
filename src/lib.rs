//! # wsrelay
//!
//! `wsrelay` multiplexes any number of WebSocket clients onto a shared set of
//! upstream pub/sub subscriptions. However many clients listen to a channel,
//! the relay holds exactly one upstream subscription for it, and drops that
//! subscription when the last client leaves or disconnects.
//!
//! ## Core Modules
//!
//! - `broker`: the topic registry, the wire protocol and the `Relay` that
//!   routes messages and tears connections down.
//! - `upstream`: the reference-counted upstream subscription manager and its
//!   backends (Redis, in-memory).
//! - `client`: a connected WebSocket client.
//! - `config`: loading server configuration from files, `.env` and the environment.
//! - `transport`: the WebSocket server.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod upstream;
pub mod utils;
