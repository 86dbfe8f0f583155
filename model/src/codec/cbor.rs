use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use super::{Codec, CodecError, CodecKind, Encoder};
use crate::subject::Subject;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cbor;

impl Codec for Cbor {
    fn kind(&self) -> CodecKind {
        CodecKind::CBOR
    }
}

impl<T> Encoder<T> for Cbor
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, _subject: &Subject, value: &T) -> Result<Bytes, CodecError> {
        let mut buffer = Vec::new();
        ciborium::into_writer(value, &mut buffer).map_err(CodecError::encode_error)?;
        Ok(Bytes::from(buffer))
    }
    fn decode(&self, _subject: &Subject, mut bytes: &[u8]) -> Result<T, CodecError> {
        ciborium::from_reader(&mut bytes).map_err(CodecError::decode_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{family, Member};

    #[test]
    fn test_cbor() {
        let subject = Subject::const_new("cbor_test");
        let encoded = Cbor.encode(&subject, &family()).expect("encode failed");
        let decoded: Member = Cbor.decode(&subject, &encoded).unwrap();
        assert_eq!(decoded, family());

        let truncated = &encoded[..encoded.len() - 3];
        let error = <Cbor as Encoder<Member>>::decode(&Cbor, &subject, truncated).unwrap_err();
        assert!(error.is_decode());
    }
}
