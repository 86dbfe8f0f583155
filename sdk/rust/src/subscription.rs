use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use encoded_mq_model::{Encoder, QueueGroup, RawSubscription, Subject, SubscriptionId};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{
    handler::{Delivery, ErrorHandler, Handler},
    ClientError, Result,
};

pub(crate) trait SubscriptionRegistry: Send + Sync {
    fn remove(&self, sid: SubscriptionId) -> BoxFuture<'_, Result<()>>;
    /// forget a subscription the transport has already ended
    fn detach(&self, sid: SubscriptionId) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Default)]
pub(crate) struct SubscriptionStats {
    delivered: AtomicU64,
    decode_failures: AtomicU64,
}

/// Handle of a typed subscription.
///
/// Dropping the handle leaves the subscription running, call
/// [`unsubscribe`](Self::unsubscribe) or close the connection to stop it.
pub struct Subscription {
    pub(crate) sid: SubscriptionId,
    pub(crate) subject: Subject,
    pub(crate) queue: Option<QueueGroup>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) stats: Arc<SubscriptionStats>,
    pub(crate) registry: Weak<dyn SubscriptionRegistry>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("sid", &self.sid)
            .field("subject", &self.subject)
            .field("queue", &self.queue)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub fn sid(&self) -> SubscriptionId {
        self.sid
    }
    pub fn subject(&self) -> &Subject {
        &self.subject
    }
    pub fn queue(&self) -> Option<&QueueGroup> {
        self.queue.as_ref()
    }
    /// number of handler invocations so far
    pub fn delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }
    /// number of messages skipped because they could not be decoded
    pub fn decode_failures(&self) -> u64 {
        self.stats.decode_failures.load(Ordering::Relaxed)
    }
    pub fn is_active(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
    /// Stop dispatching to this subscription.
    ///
    /// An invocation already running is not interrupted.
    pub async fn unsubscribe(self) -> Result<()> {
        let Some(registry) = self.registry.upgrade() else {
            self.cancellation_token.cancel();
            return Err(ClientError::closed());
        };
        let result = registry.remove(self.sid).await;
        self.cancellation_token.cancel();
        result
    }
}

pub(crate) async fn dispatch<C, H, A>(
    mut raw: RawSubscription,
    codec: Arc<C>,
    handler: H,
    error_handler: ErrorHandler,
    ct: CancellationToken,
    stats: Arc<SubscriptionStats>,
    registry: Weak<dyn SubscriptionRegistry>,
) where
    C: Encoder<H::Message>,
    H: Handler<A>,
    A: 'static,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = ct.cancelled() => {
                tracing::debug!("dispatch cancelled");
                break
            }
            received = raw.next_message() => {
                match received {
                    Some(message) => message,
                    None => {
                        tracing::debug!("subscription ended by transport");
                        if let Some(registry) = registry.upgrade() {
                            registry.detach(raw.sid).await;
                        }
                        break
                    }
                }
            }
        };
        tracing::trace!(subject = %message.subject, size = message.len(), "handle message");
        let value = match <C as Encoder<H::Message>>::decode(&codec, &message.subject, &message.payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode message, this message will be ignored");
                stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                (error_handler)(&ClientError::from(e));
                continue;
            }
        };
        let delivery = Delivery {
            sid: raw.sid,
            subject: message.subject,
            reply: message.reply,
        };
        stats.delivered.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = handler.clone().handle(delivery, value).await {
            tracing::warn!(error = %e, "handler process error");
            (error_handler)(&ClientError::handler(e));
        }
    }
    ct.cancel();
}
