use bytes::{Bytes, BytesMut};

use super::{Codec, CodecError, CodecKind, Encoder};
use crate::subject::Subject;

/// Protocol buffers codec for every [`prost::Message`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Protobuf;

impl Codec for Protobuf {
    fn kind(&self) -> CodecKind {
        CodecKind::PROTOBUF
    }
}

impl<T> Encoder<T> for Protobuf
where
    T: prost::Message + Default,
{
    fn encode(&self, _subject: &Subject, value: &T) -> Result<Bytes, CodecError> {
        let mut buffer = BytesMut::with_capacity(value.encoded_len());
        value.encode(&mut buffer).map_err(CodecError::encode_error)?;
        Ok(buffer.freeze())
    }
    fn decode(&self, _subject: &Subject, bytes: &[u8]) -> Result<T, CodecError> {
        T::decode(bytes).map_err(CodecError::decode_error)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Person {
        #[prost(string, tag = "1")]
        name: String,
        #[prost(int32, tag = "2")]
        age: i32,
        #[prost(string, tag = "3")]
        address: String,
        #[prost(map = "string, message", tag = "10")]
        children: HashMap<String, Person>,
    }

    fn person(name: &str, age: i32) -> Person {
        Person {
            name: name.to_owned(),
            age,
            address: "140 New Montgomery St".to_owned(),
            children: HashMap::new(),
        }
    }

    fn derek() -> Person {
        let mut me = person("derek", 22);
        me.children.insert("sam".to_owned(), person("sam", 19));
        me.children.insert("meg".to_owned(), person("meg", 17));
        me
    }

    #[test]
    fn test_protobuf_nested_map() {
        let subject = Subject::const_new("protobuf_test");
        let me = derek();
        let encoded = Protobuf.encode(&subject, &me).expect("encode failed");
        assert_eq!(encoded.len(), prost::Message::encoded_len(&me));
        let decoded: Person = Protobuf.decode(&subject, &encoded).unwrap();
        assert_eq!(decoded, me);
        assert_eq!(decoded.children.len(), 2);
        assert_eq!(decoded.children["meg"].age, 17);
    }

    #[test]
    fn test_protobuf_rejects_truncated() {
        let subject = Subject::const_new("protobuf_test");
        let encoded = Protobuf.encode(&subject, &derek()).expect("encode failed");
        let truncated = &encoded[..encoded.len() - 1];
        let error = <Protobuf as Encoder<Person>>::decode(&Protobuf, &subject, truncated)
            .unwrap_err();
        assert!(error.is_decode());
    }

    #[test]
    fn test_protobuf_rejects_garbage_and_wire_type_mismatch() {
        let subject = Subject::const_new("protobuf_test");
        let error =
            <Protobuf as Encoder<Person>>::decode(&Protobuf, &subject, &[0xff; 4]).unwrap_err();
        assert!(error.is_decode());
        // field 1 is a string, a varint on tag 1 does not fit the schema
        let error =
            <Protobuf as Encoder<Person>>::decode(&Protobuf, &subject, &[0x08, 0x01]).unwrap_err();
        assert!(error.is_decode());
    }

    #[test]
    fn test_protobuf_concurrent_encode() {
        let subject = Subject::const_new("protobuf_test");
        let codec = std::sync::Arc::new(Protobuf);
        let handles = (0..8)
            .map(|_| {
                let codec = codec.clone();
                let subject = subject.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let encoded = codec.encode(&subject, &derek()).expect("encode failed");
                        let decoded: Person = codec.decode(&subject, &encoded).unwrap();
                        assert_eq!(decoded, derek());
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
