//! Transports an [`EncodedConnection`](crate::EncodedConnection) can run on.
pub mod local;
pub use encoded_mq_model::transport::*;
pub use local::{LocalBroker, LocalBrokerConfig, LocalTransport};
