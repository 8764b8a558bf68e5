//! The `client` module defines the representation of a downstream connection.
//!
//! It provides the `Client` struct, which carries the identity the broker keys
//! its subscription sets by, and the channel used to push frames to the
//! connection's writer task.

pub mod pubsub_client;
pub use pubsub_client::{Client, ClientId};
