//! In process broker.
//!
//! Every [`LocalTransport`] created by [`LocalBroker::connect`] shares the broker's
//! subscription table, so a message published on one transport reaches the matching
//! subscriptions of all of them.
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use encoded_mq_model::{
    QueueGroup, RawMessage, RawSubscription, Subject, SubscriptionId, Transport, TransportError,
    TransportErrorKind,
};
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedSender},
    RwLock,
};

pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LocalBrokerConfig {
    pub max_payload: usize,
}

impl Default for LocalBrokerConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[derive(Debug)]
struct LocalSubscriber {
    client: u64,
    subject: Subject,
    queue: Option<QueueGroup>,
    tx: UnboundedSender<RawMessage>,
}

#[derive(Debug, Default)]
struct LocalBrokerInner {
    config: LocalBrokerConfig,
    subscribers: RwLock<BTreeMap<SubscriptionId, LocalSubscriber>>,
    next_sid: AtomicU64,
    next_client: AtomicU64,
    queue_cursor: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct LocalBroker {
    inner: Arc<LocalBrokerInner>,
}

impl LocalBroker {
    pub fn new(config: LocalBrokerConfig) -> Self {
        Self {
            inner: Arc::new(LocalBrokerInner {
                config,
                ..Default::default()
            }),
        }
    }
    pub fn config(&self) -> &LocalBrokerConfig {
        &self.inner.config
    }
    pub fn connect(&self) -> LocalTransport {
        let client = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(client, "local transport connected");
        LocalTransport {
            client,
            broker: self.clone(),
            closed: AtomicBool::new(false),
        }
    }
    pub async fn subscription_count(&self) -> usize {
        self.inner.subscribers.read().await.len()
    }

    async fn route(&self, message: RawMessage) {
        let subscribers = self.inner.subscribers.read().await;
        let mut groups: HashMap<&QueueGroup, Vec<(&SubscriptionId, &LocalSubscriber)>> =
            HashMap::new();
        let mut dropped = Vec::new();
        for (sid, subscriber) in subscribers.iter() {
            if !subscriber.subject.matches(&message.subject) {
                continue;
            }
            match &subscriber.queue {
                Some(queue) => groups.entry(queue).or_default().push((sid, subscriber)),
                None => {
                    if subscriber.tx.send(message.clone()).is_err() {
                        tracing::warn!(%sid, "target subscription is dropped");
                        dropped.push(*sid);
                    }
                }
            }
        }
        for (queue, members) in groups {
            let start = self.inner.queue_cursor.fetch_add(1, Ordering::Relaxed);
            let delivered = (0..members.len()).any(|offset| {
                let (sid, subscriber) = members[(start + offset) % members.len()];
                if subscriber.tx.send(message.clone()).is_ok() {
                    return true;
                }
                tracing::warn!(%sid, %queue, "target subscription is dropped");
                dropped.push(*sid);
                false
            });
            if !delivered {
                tracing::debug!(%queue, subject = %message.subject, "no live member in queue group");
            }
        }
        drop(subscribers);
        if !dropped.is_empty() {
            let mut subscribers = self.inner.subscribers.write().await;
            for sid in dropped {
                subscribers.remove(&sid);
            }
        }
    }
}

/// One client's view of a [`LocalBroker`].
#[derive(Debug)]
pub struct LocalTransport {
    client: u64,
    broker: LocalBroker,
    closed: AtomicBool,
}

impl LocalTransport {
    pub fn broker(&self) -> &LocalBroker {
        &self.broker
    }
    fn ensure_open(&self, context: &'static str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::closed(context));
        }
        Ok(())
    }
}

impl Transport for LocalTransport {
    async fn publish(&self, message: RawMessage) -> Result<(), TransportError> {
        self.ensure_open("local publish")?;
        if !message.subject.is_valid_publish() {
            return Err(TransportError::new(
                TransportErrorKind::InvalidSubject(message.subject),
                "local publish",
            ));
        }
        let max = self.broker.inner.config.max_payload;
        if message.len() > max {
            return Err(TransportError::new(
                TransportErrorKind::PayloadTooLarge {
                    size: message.len(),
                    max,
                },
                "local publish",
            ));
        }
        self.broker.route(message).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: Subject,
        queue: Option<QueueGroup>,
    ) -> Result<RawSubscription, TransportError> {
        self.ensure_open("local subscribe")?;
        if !subject.is_valid_subscribe() {
            return Err(TransportError::new(
                TransportErrorKind::InvalidSubject(subject),
                "local subscribe",
            ));
        }
        let sid = SubscriptionId(self.broker.inner.next_sid.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = unbounded_channel();
        self.broker.inner.subscribers.write().await.insert(
            sid,
            LocalSubscriber {
                client: self.client,
                subject: subject.clone(),
                queue: queue.clone(),
                tx,
            },
        );
        Ok(RawSubscription {
            sid,
            subject,
            queue,
            rx,
        })
    }

    async fn unsubscribe(&self, sid: SubscriptionId) -> Result<(), TransportError> {
        self.ensure_open("local unsubscribe")?;
        let mut subscribers = self.broker.inner.subscribers.write().await;
        match subscribers.get(&sid) {
            Some(subscriber) if subscriber.client == self.client => {
                subscribers.remove(&sid);
                Ok(())
            }
            _ => Err(TransportError::new(
                TransportErrorKind::UnknownSubscription(sid),
                "local unsubscribe",
            )),
        }
    }

    async fn flush(&self) -> Result<(), TransportError> {
        // routing hands messages to the mailboxes before `publish` returns
        self.ensure_open("local flush")
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.broker
            .inner
            .subscribers
            .write()
            .await
            .retain(|_, subscriber| subscriber.client != self.client);
        tracing::debug!(client = self.client, "local transport closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use encoded_mq_model::bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_fan_out_and_wildcard() {
        let broker = LocalBroker::default();
        let transport = broker.connect();
        let mut exact = transport
            .subscribe(Subject::const_new("orders.created"), None)
            .await
            .unwrap();
        let mut wildcard = transport
            .subscribe(Subject::const_new("orders.>"), None)
            .await
            .unwrap();
        let mut other = transport
            .subscribe(Subject::const_new("users.*"), None)
            .await
            .unwrap();
        transport
            .publish(RawMessage::new(Subject::const_new("orders.created"), "a"))
            .await
            .unwrap();
        assert_eq!(exact.next_message().await.unwrap().payload, Bytes::from("a"));
        assert_eq!(wildcard.next_message().await.unwrap().payload, Bytes::from("a"));
        assert!(other.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_queue_group_delivers_once() {
        let broker = LocalBroker::default();
        let transport = broker.connect();
        let queue = QueueGroup::const_new("workers");
        let mut a = transport
            .subscribe(Subject::const_new("jobs"), Some(queue.clone()))
            .await
            .unwrap();
        let mut b = transport
            .subscribe(Subject::const_new("jobs"), Some(queue))
            .await
            .unwrap();
        for n in 0..10u8 {
            transport
                .publish(RawMessage::new(Subject::const_new("jobs"), vec![n]))
                .await
                .unwrap();
        }
        let mut received = 0;
        while a.rx.try_recv().is_ok() {
            received += 1;
        }
        while b.rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 10);
    }

    #[tokio::test]
    async fn test_publish_validation() {
        let broker = LocalBroker::new(LocalBrokerConfig { max_payload: 4 });
        let transport = broker.connect();
        let error = transport
            .publish(RawMessage::new(Subject::const_new("a.*"), "x"))
            .await
            .unwrap_err();
        assert!(matches!(error.kind, TransportErrorKind::InvalidSubject(_)));
        let error = transport
            .publish(RawMessage::new(Subject::const_new("a"), "too large"))
            .await
            .unwrap_err();
        assert!(matches!(
            error.kind,
            TransportErrorKind::PayloadTooLarge { size: 9, max: 4 }
        ));
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let broker = LocalBroker::default();
        let transport = broker.connect();
        let survivor = broker.connect();
        let mut subscription = transport
            .subscribe(Subject::const_new("t"), None)
            .await
            .unwrap();
        let _kept = survivor.subscribe(Subject::const_new("t"), None).await.unwrap();
        assert_eq!(broker.subscription_count().await, 2);
        transport.close().await;
        transport.close().await;
        assert!(transport.is_closed());
        assert_eq!(broker.subscription_count().await, 1);
        assert!(subscription.next_message().await.is_none());
        let error = transport
            .publish(RawMessage::new(Subject::const_new("t"), "x"))
            .await
            .unwrap_err();
        assert!(error.is_closed());
    }

    #[tokio::test]
    async fn test_unsubscribe_foreign_sid() {
        let broker = LocalBroker::default();
        let owner = broker.connect();
        let stranger = broker.connect();
        let subscription = owner.subscribe(Subject::const_new("t"), None).await.unwrap();
        let error = stranger.unsubscribe(subscription.sid).await.unwrap_err();
        assert!(matches!(error.kind, TransportErrorKind::UnknownSubscription(_)));
        owner.unsubscribe(subscription.sid).await.unwrap();
        assert_eq!(broker.subscription_count().await, 0);
    }
}
