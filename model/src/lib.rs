pub mod codec;
pub mod message;
pub mod subject;
pub mod transport;

pub use bytes;
pub use codec::{Codec, CodecError, CodecErrorKind, CodecKind, DynCodec, Encoder, Json};
pub use message::RawMessage;
pub use subject::{QueueGroup, Subject, SubscriptionId};
pub use transport::{RawSubscription, Transport, TransportError, TransportErrorKind};

#[cfg(feature = "bincode")]
pub use codec::Bincode;
#[cfg(feature = "cbor")]
pub use codec::Cbor;
#[cfg(feature = "protobuf")]
pub use codec::Protobuf;
