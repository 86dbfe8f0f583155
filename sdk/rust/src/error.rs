use encoded_mq_model::{CodecError, CodecErrorKind, TransportError};

#[derive(Debug)]
pub struct ClientError {
    pub kind: ClientErrorKind,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ClientErrorKind::Encode(e) | ClientErrorKind::Decode(e) => Some(e),
            ClientErrorKind::Transport(e) => Some(e),
            ClientErrorKind::Handler(e) => Some(&**e),
            ClientErrorKind::Closed | ClientErrorKind::Timeout => None,
        }
    }
}

impl ClientError {
    pub fn closed() -> Self {
        ClientError {
            kind: ClientErrorKind::Closed,
        }
    }
    pub fn timeout() -> Self {
        ClientError {
            kind: ClientErrorKind::Timeout,
        }
    }
    pub fn handler<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        ClientError {
            kind: ClientErrorKind::Handler(Box::new(e)),
        }
    }
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Closed)
    }
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Timeout)
    }
    pub fn is_encode(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Encode(_))
    }
    pub fn is_decode(&self) -> bool {
        matches!(self.kind, ClientErrorKind::Decode(_))
    }
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self {
        let kind = match e.kind {
            CodecErrorKind::Decode => ClientErrorKind::Decode(e),
            CodecErrorKind::Encode | CodecErrorKind::Unregistered => ClientErrorKind::Encode(e),
        };
        ClientError { kind }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        if e.is_closed() {
            return ClientError::closed();
        }
        ClientError {
            kind: ClientErrorKind::Transport(e),
        }
    }
}

#[derive(Debug)]
pub enum ClientErrorKind {
    Encode(CodecError),
    Decode(CodecError),
    Transport(TransportError),
    Closed,
    Timeout,
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientErrorKind::Encode(e) => write!(f, "Encode error: {}", e),
            ClientErrorKind::Decode(e) => write!(f, "Decode error: {}", e),
            ClientErrorKind::Transport(e) => write!(f, "Transport error: {}", e),
            ClientErrorKind::Closed => write!(f, "Connection closed"),
            ClientErrorKind::Timeout => write!(f, "Timeout"),
            ClientErrorKind::Handler(e) => write!(f, "Handler error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use encoded_mq_model::{Encoder, Json, Subject, TransportErrorKind};

    use super::*;

    #[test]
    fn test_codec_error_routing() {
        let subject = Subject::const_new("error_test");
        let decode = <Json as Encoder<u32>>::decode(&Json, &subject, b"not a number").unwrap_err();
        let error = ClientError::from(decode);
        assert!(error.is_decode());
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_transport_closed_maps_to_closed() {
        let error = ClientError::from(TransportError::closed("publish"));
        assert!(error.is_closed());

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let error = ClientError::from(TransportError::underlying("publish")(io));
        assert!(matches!(
            error.kind,
            ClientErrorKind::Transport(TransportError {
                kind: TransportErrorKind::Underlying(_),
                ..
            })
        ));
        assert!(error.to_string().contains("pipe"));
    }
}
