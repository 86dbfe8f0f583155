use std::{borrow::Cow, future::Future};

use futures_util::Stream;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    message::RawMessage,
    subject::{QueueGroup, Subject, SubscriptionId},
};

#[derive(Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub context: Cow<'static, str>,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.kind)
    }
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, context: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }
    pub fn closed(context: impl Into<Cow<'static, str>>) -> Self {
        Self::new(TransportErrorKind::Closed, context)
    }
    pub fn underlying<E: std::error::Error + Send + Sync + 'static>(
        context: impl Into<Cow<'static, str>>,
    ) -> impl FnOnce(E) -> Self {
        move |e| Self::new(TransportErrorKind::Underlying(Box::new(e)), context)
    }
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Closed)
    }
}

#[derive(Debug)]
pub enum TransportErrorKind {
    Closed,
    InvalidSubject(Subject),
    PayloadTooLarge { size: usize, max: usize },
    UnknownSubscription(SubscriptionId),
    Underlying(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Closed => write!(f, "transport closed"),
            TransportErrorKind::InvalidSubject(subject) => {
                write!(f, "invalid subject: {:?}", subject.as_str())
            }
            TransportErrorKind::PayloadTooLarge { size, max } => {
                write!(f, "payload of {size} bytes exceeds maximum of {max} bytes")
            }
            TransportErrorKind::UnknownSubscription(sid) => {
                write!(f, "unknown subscription: {sid}")
            }
            TransportErrorKind::Underlying(e) => write!(f, "underlying error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            TransportErrorKind::Underlying(e) => Some(&**e),
            _ => None,
        }
    }
}

/// Receiving side of a raw subscription.
///
/// Messages are yielded in the order the transport delivered them; the stream ends
/// once the transport drops the subscription (unsubscribe or close).
#[derive(Debug)]
pub struct RawSubscription {
    pub sid: SubscriptionId,
    pub subject: Subject,
    pub queue: Option<QueueGroup>,
    pub rx: UnboundedReceiver<RawMessage>,
}

impl RawSubscription {
    pub async fn next_message(&mut self) -> Option<RawMessage> {
        self.rx.recv().await
    }
}

impl Stream for RawSubscription {
    type Item = RawMessage;
    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Byte oriented publish/subscribe collaborator.
///
/// Connection establishment, authentication and routing are the transport's business;
/// an encoded connection only relies on the operations below.
pub trait Transport: Send + Sync + 'static {
    fn publish(&self, message: RawMessage)
        -> impl Future<Output = Result<(), TransportError>> + Send;
    fn subscribe(
        &self,
        subject: Subject,
        queue: Option<QueueGroup>,
    ) -> impl Future<Output = Result<RawSubscription, TransportError>> + Send;
    fn unsubscribe(
        &self,
        sid: SubscriptionId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
    /// resolves once every message published before the call has been handed to the network
    fn flush(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
    /// ends every subscription of this transport, idempotent
    fn close(&self) -> impl Future<Output = ()> + Send;
    fn is_closed(&self) -> bool;
}
