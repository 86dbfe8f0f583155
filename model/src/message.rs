use bytes::Bytes;

use crate::subject::Subject;

/// The unit a [`Transport`](crate::Transport) moves: a subject, an optional reply subject and opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub subject: Subject,
    pub reply: Option<Subject>,
    pub payload: Bytes,
}

impl RawMessage {
    pub fn new(subject: Subject, payload: impl Into<Bytes>) -> Self {
        Self {
            subject,
            reply: None,
            payload: payload.into(),
        }
    }
    pub fn with_reply(mut self, reply: Subject) -> Self {
        self.reply = Some(reply);
        self
    }
    pub fn len(&self) -> usize {
        self.payload.len()
    }
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
