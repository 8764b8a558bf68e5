pub mod engine;
pub mod message;
pub mod registry;
pub mod topic;

pub use engine::Relay;
pub use message::{Envelope, Reply, Request};
pub use registry::{Added, Removed, TopicRegistry};
