use std::{future::Future, marker::PhantomData, sync::Arc};

use encoded_mq_model::{Subject, SubscriptionId};

use crate::ClientError;

/// Where a decoded message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sid: SubscriptionId,
    /// the concrete subject the message was published on
    pub subject: Subject,
    /// reply subject for request/reply
    pub reply: Option<Subject>,
}

/// A typed message handler.
///
/// The decode target of a subscription is [`Handler::Message`], fixed when the handler
/// is registered. Implemented for async closures `Fn(M) -> Fut` and `Fn(Delivery, M) -> Fut`.
pub trait Handler<A>: Clone + Sync + Send + 'static {
    type Message: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;
    fn handle(
        self,
        delivery: Delivery,
        message: Self::Message,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Adapter for handlers that only take the message.
#[derive(Debug, Clone)]
pub struct PlainFnAdapter<M, E>(PhantomData<*const fn(M) -> E>);
impl<M, F, Fut, E> Handler<PlainFnAdapter<M, E>> for F
where
    E: std::error::Error + Send + Sync + 'static,
    M: Send + 'static,
    F: (Fn(M) -> Fut) + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
{
    type Message = M;
    type Error = E;
    fn handle(
        self,
        _delivery: Delivery,
        message: Self::Message,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        (self)(message)
    }
}

/// Adapter for handlers that also want the subject and reply subject.
#[derive(Debug, Clone)]
pub struct DeliveryFnAdapter<M, E>(PhantomData<*const fn(Delivery, M) -> E>);
impl<M, F, Fut, E> Handler<DeliveryFnAdapter<M, E>> for F
where
    E: std::error::Error + Send + Sync + 'static,
    M: Send + 'static,
    F: (Fn(Delivery, M) -> Fut) + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
{
    type Message = M;
    type Error = E;
    fn handle(
        self,
        delivery: Delivery,
        message: Self::Message,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        (self)(delivery, message)
    }
}

/// Receives errors that happen away from the caller: decode failures and handler
/// errors during dispatch, publish failures of bound channels.
pub type ErrorHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;

pub(crate) fn default_error_handler() -> ErrorHandler {
    Arc::new(|error: &ClientError| {
        tracing::warn!(%error, "asynchronous error");
    })
}
