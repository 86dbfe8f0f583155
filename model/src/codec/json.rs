use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use super::{Codec, CodecError, CodecKind, Encoder};
use crate::subject::Subject;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Json;

impl Codec for Json {
    fn kind(&self) -> CodecKind {
        CodecKind::JSON
    }
}

impl<T> Encoder<T> for Json
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, _subject: &Subject, value: &T) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(CodecError::encode_error)
    }
    fn decode(&self, _subject: &Subject, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::decode_error)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::codec::tests::{family, Member};

    #[test]
    fn test_json() {
        let subject = Subject::const_new("json_test");
        let encoded = Json.encode(&subject, &family()).expect("encode failed");
        let decoded: Member = Json.decode(&subject, &encoded).unwrap();
        assert_eq!(decoded, family());
    }

    #[test]
    fn test_json_rejects_malformed() {
        let subject = Subject::const_new("json_test");
        let encoded = Json.encode(&subject, &family()).expect("encode failed");
        let truncated = &encoded[..encoded.len() / 2];
        let error = <Json as Encoder<Member>>::decode(&Json, &subject, truncated).unwrap_err();
        assert!(error.is_decode());
        let error = <Json as Encoder<Member>>::decode(&Json, &subject, b"[1, 2, 3]").unwrap_err();
        assert!(error.is_decode());
    }

    #[test]
    fn test_json_non_string_key_is_encode_error() {
        let subject = Subject::const_new("json_test");
        let value = HashMap::from([((1u8, 2u8), "tuple key".to_owned())]);
        let error = Json.encode(&subject, &value).unwrap_err();
        assert!(error.is_encode());
    }
}
