mod channel;
pub mod connection;
pub use connection::{EncodedConnection, EncodedConnectionBuilder, EncodedConnectionConfig};
mod error;
pub use error::{ClientError, ClientErrorKind};
pub mod handler;
pub use handler::{Delivery, ErrorHandler, Handler};
mod subscription;
pub use subscription::Subscription;
pub mod transport;
pub mod wait;

pub use encoded_mq_model as model;
pub type Result<T> = std::result::Result<T, ClientError>;

pub mod prelude {
    pub use crate::model::{
        Codec, CodecKind, DynCodec, Encoder, Json, QueueGroup, Subject, Transport,
    };
    #[cfg(feature = "bincode")]
    pub use crate::model::Bincode;
    #[cfg(feature = "cbor")]
    pub use crate::model::Cbor;
    #[cfg(feature = "protobuf")]
    pub use crate::model::Protobuf;
    pub use crate::transport::{LocalBroker, LocalBrokerConfig, LocalTransport};
    pub use crate::{
        ClientError, Delivery, EncodedConnection, EncodedConnectionConfig, Subscription,
    };
}
