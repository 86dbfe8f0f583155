use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use super::{Codec, CodecError, CodecKind, Encoder};
use crate::subject::Subject;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bincode;

pub const BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

impl Codec for Bincode {
    fn kind(&self) -> CodecKind {
        CodecKind::BINCODE
    }
}

impl<T> Encoder<T> for Bincode
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, _subject: &Subject, value: &T) -> Result<Bytes, CodecError> {
        bincode::serde::encode_to_vec(value, BINCODE_CONFIG)
            .map(Bytes::from)
            .map_err(CodecError::encode_error)
    }
    fn decode(&self, _subject: &Subject, bytes: &[u8]) -> Result<T, CodecError> {
        let (value, read) = bincode::serde::decode_from_slice(bytes, BINCODE_CONFIG)
            .map_err(CodecError::decode_error)?;
        if read != bytes.len() {
            return Err(CodecError::decode_error(format!(
                "unexpected trailing bytes: {} of {} consumed",
                read,
                bytes.len()
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{family, Member};

    #[test]
    fn test_bincode() {
        let codec = Bincode;
        let subject = Subject::const_new("bincode_test");
        let encoded = codec.encode(&subject, &family()).expect("encode failed");
        let decoded: Member = codec.decode(&subject, &encoded).unwrap();
        assert_eq!(decoded, family());
    }

    #[test]
    fn test_bincode_rejects_truncated_and_trailing() {
        let codec = Bincode;
        let subject = Subject::const_new("bincode_test");
        let encoded = codec.encode(&subject, &family()).expect("encode failed");

        let truncated = &encoded[..encoded.len() - 1];
        let error = <Bincode as Encoder<Member>>::decode(&codec, &subject, truncated).unwrap_err();
        assert!(error.is_decode());

        let mut trailing = encoded.to_vec();
        trailing.push(0);
        let error = <Bincode as Encoder<Member>>::decode(&codec, &subject, &trailing).unwrap_err();
        assert!(error.is_decode());
    }
}
