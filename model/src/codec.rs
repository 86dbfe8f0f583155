//! Pluggable codecs between typed values and message payloads.
//!
//! A codec is stateless, one instance may be shared by any number of concurrent
//! publishers and dispatchers. Which types a codec accepts is expressed by its
//! [`Encoder<T>`] impls, so an unsupported type is rejected at compile time.
use std::{borrow::Cow, str::FromStr};

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::subject::Subject;

#[cfg(feature = "bincode")]
mod bincode;
#[cfg(feature = "bincode")]
pub use bincode::*;
#[cfg(feature = "cbor")]
mod cbor;
#[cfg(feature = "cbor")]
pub use cbor::*;
mod json;
pub use json::*;
#[cfg(feature = "protobuf")]
mod protobuf;
#[cfg(feature = "protobuf")]
pub use protobuf::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CodecKind(pub u8);

impl CodecKind {
    pub const CBOR: Self = Self(0x00);
    pub const BINCODE: Self = Self(0x01);
    pub const PROTOBUF: Self = Self(0x02);
    pub const JSON: Self = Self(0x40);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::CBOR => Some("cbor"),
            Self::BINCODE => Some("bincode"),
            Self::PROTOBUF => Some("protobuf"),
            Self::JSON => Some("json"),
            _ => None,
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:02x}", self.0),
        }
    }
}

impl FromStr for CodecKind {
    type Err = CodecError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbor" => Ok(Self::CBOR),
            "bincode" => Ok(Self::BINCODE),
            "protobuf" | "proto" => Ok(Self::PROTOBUF),
            "json" => Ok(Self::JSON),
            other => Err(CodecError::unknown_codec_name(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecErrorKind {
    Encode,
    Decode,
    Unregistered,
}

#[derive(Debug)]
pub struct CodecError {
    pub kind: CodecErrorKind,
    reason: Cow<'static, str>,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CodecErrorKind::Encode => write!(f, "encode error: {}", self.reason),
            CodecErrorKind::Decode => write!(f, "decode error: {}", self.reason),
            CodecErrorKind::Unregistered => write!(f, "unregistered codec: {}", self.reason),
        }
    }
}

impl std::error::Error for CodecError {}

impl CodecError {
    pub fn encode_error<E: std::fmt::Display>(e: E) -> Self {
        Self {
            kind: CodecErrorKind::Encode,
            reason: e.to_string().into(),
        }
    }
    pub fn decode_error<E: std::fmt::Display>(e: E) -> Self {
        Self {
            kind: CodecErrorKind::Decode,
            reason: e.to_string().into(),
        }
    }
    pub fn unregistered_codec(codec: CodecKind) -> Self {
        Self {
            kind: CodecErrorKind::Unregistered,
            reason: codec.to_string().into(),
        }
    }
    fn unknown_codec_name(name: String) -> Self {
        Self {
            kind: CodecErrorKind::Unregistered,
            reason: name.into(),
        }
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    pub fn is_encode(&self) -> bool {
        self.kind == CodecErrorKind::Encode
    }
    pub fn is_decode(&self) -> bool {
        self.kind == CodecErrorKind::Decode
    }
}

pub trait Codec: Send + Sync + 'static {
    fn kind(&self) -> CodecKind;
}

/// Converts `T` to a payload and back.
///
/// `decode(encode(v))` must equal `v`; byte identical output across calls is not required.
/// The subject is passed through for codecs that select a schema by subject.
pub trait Encoder<T>: Codec {
    fn encode(&self, subject: &Subject, value: &T) -> Result<Bytes, CodecError>;
    fn decode(&self, subject: &Subject, bytes: &[u8]) -> Result<T, CodecError>;
}

/// A serde codec picked at runtime, e.g. from a configuration string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DynCodec {
    Json(Json),
    #[cfg(feature = "bincode")]
    Bincode(Bincode),
    #[cfg(feature = "cbor")]
    Cbor(Cbor),
}

impl Default for DynCodec {
    fn default() -> Self {
        DynCodec::Json(Json)
    }
}

impl DynCodec {
    /// protobuf is not a serde format and is never available here, use [`Protobuf`] directly
    pub fn from_kind(kind: CodecKind) -> Result<Self, CodecError> {
        match kind {
            CodecKind::JSON => Ok(DynCodec::Json(Json)),
            #[cfg(feature = "bincode")]
            CodecKind::BINCODE => Ok(DynCodec::Bincode(Bincode)),
            #[cfg(feature = "cbor")]
            CodecKind::CBOR => Ok(DynCodec::Cbor(Cbor)),
            kind => Err(CodecError::unregistered_codec(kind)),
        }
    }
}

impl FromStr for DynCodec {
    type Err = CodecError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DynCodec::from_kind(s.parse()?)
    }
}

impl Codec for DynCodec {
    fn kind(&self) -> CodecKind {
        match self {
            DynCodec::Json(codec) => codec.kind(),
            #[cfg(feature = "bincode")]
            DynCodec::Bincode(codec) => codec.kind(),
            #[cfg(feature = "cbor")]
            DynCodec::Cbor(codec) => codec.kind(),
        }
    }
}

impl<T> Encoder<T> for DynCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, subject: &Subject, value: &T) -> Result<Bytes, CodecError> {
        match self {
            DynCodec::Json(codec) => codec.encode(subject, value),
            #[cfg(feature = "bincode")]
            DynCodec::Bincode(codec) => codec.encode(subject, value),
            #[cfg(feature = "cbor")]
            DynCodec::Cbor(codec) => codec.encode(subject, value),
        }
    }
    fn decode(&self, subject: &Subject, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            DynCodec::Json(codec) => codec.decode(subject, bytes),
            #[cfg(feature = "bincode")]
            DynCodec::Bincode(codec) => codec.decode(subject, bytes),
            #[cfg(feature = "cbor")]
            DynCodec::Cbor(codec) => codec.decode(subject, bytes),
        }
    }
}
