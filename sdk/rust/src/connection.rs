use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, OnceLock, Weak,
    },
    time::Duration,
};

use encoded_mq_model::{
    Codec, Encoder, QueueGroup, RawMessage, RawSubscription, Subject, SubscriptionId, Transport,
};
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    handler::{default_error_handler, ErrorHandler, Handler},
    subscription::{dispatch, Subscription, SubscriptionRegistry, SubscriptionStats},
    ClientError, Result,
};

pub const DEFAULT_INBOX_PREFIX: &str = "_INBOX";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EncodedConnectionConfig {
    /// reply subjects of [`EncodedConnection::request`] are created under this prefix
    pub inbox_prefix: String,
    pub request_timeout: Duration,
}

impl Default for EncodedConnectionConfig {
    fn default() -> Self {
        Self {
            inbox_prefix: DEFAULT_INBOX_PREFIX.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A transport paired with a codec.
///
/// Every value published through this connection is encoded with its codec and every
/// inbound message of its subscriptions is decoded with the same codec. Cloning is
/// cheap and shares the connection.
pub struct EncodedConnection<T, C> {
    pub(crate) inner: Arc<ConnectionInner<T, C>>,
}

impl<T, C> Clone for EncodedConnection<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, C> std::fmt::Debug for EncodedConnection<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedConnection")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

pub struct EncodedConnectionBuilder<T, C> {
    transport: T,
    codec: C,
    config: EncodedConnectionConfig,
    error_handler: Option<ErrorHandler>,
}

impl<T, C> EncodedConnectionBuilder<T, C>
where
    T: Transport,
    C: Codec,
{
    pub fn config(mut self, config: EncodedConnectionConfig) -> Self {
        self.config = config;
        self
    }
    pub fn error_handler(mut self, handler: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }
    pub fn build(self) -> Result<EncodedConnection<T, C>> {
        if self.transport.is_closed() {
            return Err(ClientError::closed());
        }
        static CONNECTION_ID: AtomicU64 = AtomicU64::new(0);
        let id = CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, codec = %self.codec.kind(), "encoded connection created");
        Ok(EncodedConnection {
            inner: Arc::new(ConnectionInner {
                id,
                transport: self.transport,
                codec: Arc::new(self.codec),
                config: self.config,
                error_handler: self.error_handler.unwrap_or_else(default_error_handler),
                subscriptions: Default::default(),
                inbox_seq: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                cancellation_token: CancellationToken::new(),
            }),
        })
    }
}

impl<T, C> EncodedConnection<T, C>
where
    T: Transport,
    C: Codec,
{
    pub fn new(transport: T, codec: C) -> Result<Self> {
        Self::builder(transport, codec).build()
    }
    pub fn builder(transport: T, codec: C) -> EncodedConnectionBuilder<T, C> {
        EncodedConnectionBuilder {
            transport,
            codec,
            config: EncodedConnectionConfig::default(),
            error_handler: None,
        }
    }
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
    pub fn config(&self) -> &EncodedConnectionConfig {
        &self.inner.config
    }
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
    /// number of subscriptions currently dispatching on this connection
    pub async fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().await.len()
    }
    /// report an error to the connection's error handler
    pub fn report_error(&self, error: &ClientError) {
        (self.inner.error_handler)(error)
    }
    /// a subject nobody else publishes to, suitable as a reply subject
    pub fn new_inbox(&self) -> Subject {
        static NONCE: OnceLock<String> = OnceLock::new();
        let nonce = NONCE.get_or_init(|| {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            format!("{:x}{:x}", std::process::id(), nanos)
        });
        let seq = self.inner.inbox_seq.fetch_add(1, Ordering::Relaxed);
        Subject::new(format!(
            "{}.{}.{}.{}",
            self.inner.config.inbox_prefix, nonce, self.inner.id, seq
        ))
    }

    /// Encode `value` and hand it to the transport.
    ///
    /// Returns once the transport accepted the message, delivery is asynchronous.
    pub async fn publish<M>(&self, subject: impl Into<Subject>, value: &M) -> Result<()>
    where
        C: Encoder<M>,
    {
        self.inner.publish(subject.into(), None, value).await
    }

    /// Publish with a reply subject, the receiver may answer to `reply`.
    pub async fn publish_request<M>(
        &self,
        subject: impl Into<Subject>,
        reply: impl Into<Subject>,
        value: &M,
    ) -> Result<()>
    where
        C: Encoder<M>,
    {
        self.inner
            .publish(subject.into(), Some(reply.into()), value)
            .await
    }

    /// Register `handler` for `subject`.
    ///
    /// Each message is decoded into `H::Message` before the handler runs. Messages that
    /// fail to decode are reported to the error handler and skipped, the subscription
    /// stays active. Invocations of one subscription never overlap and follow the
    /// transport's delivery order.
    pub async fn subscribe<H, A>(&self, subject: impl Into<Subject>, handler: H) -> Result<Subscription>
    where
        H: Handler<A>,
        A: 'static,
        C: Encoder<H::Message>,
    {
        self.subscribe_inner(subject.into(), None, handler).await
    }

    /// Like [`subscribe`](Self::subscribe), but each message goes to a single member of `queue`.
    pub async fn queue_subscribe<H, A>(
        &self,
        subject: impl Into<Subject>,
        queue: impl Into<QueueGroup>,
        handler: H,
    ) -> Result<Subscription>
    where
        H: Handler<A>,
        A: 'static,
        C: Encoder<H::Message>,
    {
        self.subscribe_inner(subject.into(), Some(queue.into()), handler)
            .await
    }

    async fn subscribe_inner<H, A>(
        &self,
        subject: Subject,
        queue: Option<QueueGroup>,
        handler: H,
    ) -> Result<Subscription>
    where
        H: Handler<A>,
        A: 'static,
        C: Encoder<H::Message>,
    {
        self.inner.ensure_open()?;
        let raw = self
            .inner
            .transport
            .subscribe(subject.clone(), queue.clone())
            .await?;
        let sid = raw.sid;
        let ct = self.inner.cancellation_token.child_token();
        let stats = Arc::new(SubscriptionStats::default());
        self.inner
            .subscriptions
            .write()
            .await
            .insert(sid, ct.clone());
        tracing::debug!(%subject, %sid, queue = ?queue, "subscribed");
        let registry: Weak<dyn SubscriptionRegistry> =
            Arc::downgrade(&self.inner) as Weak<dyn SubscriptionRegistry>;
        let task = dispatch::<C, H, A>(
            raw,
            self.inner.codec.clone(),
            handler,
            self.inner.error_handler.clone(),
            ct.clone(),
            stats.clone(),
            registry.clone(),
        )
        .instrument(tracing::info_span!("dispatch", %subject, %sid));
        tokio::spawn(task);
        Ok(Subscription {
            sid,
            subject,
            queue,
            cancellation_token: ct,
            stats,
            registry,
        })
    }

    /// Publish `request` with a fresh inbox as reply subject and wait for one reply.
    ///
    /// Fails with a timeout error when no reply arrives within `timeout`.
    pub async fn request<Req, Resp>(
        &self,
        subject: impl Into<Subject>,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        C: Encoder<Req> + Encoder<Resp>,
    {
        self.inner.ensure_open()?;
        let subject = subject.into();
        let payload = <C as Encoder<Req>>::encode(&self.inner.codec, &subject, request)?;
        let inbox = self.new_inbox();
        let mut raw = self.inner.transport.subscribe(inbox.clone(), None).await?;
        let message = RawMessage::new(subject, payload).with_reply(inbox);
        let result = self.exchange::<Resp>(message, &mut raw, timeout).await;
        if let Err(e) = self.inner.transport.unsubscribe(raw.sid).await {
            tracing::trace!(error = %e, sid = %raw.sid, "failed to remove inbox subscription");
        }
        result
    }

    /// [`request`](Self::request) with the configured request timeout
    pub async fn request_default<Req, Resp>(
        &self,
        subject: impl Into<Subject>,
        request: &Req,
    ) -> Result<Resp>
    where
        C: Encoder<Req> + Encoder<Resp>,
    {
        let timeout = self.inner.config.request_timeout;
        self.request(subject, request, timeout).await
    }

    async fn exchange<Resp>(
        &self,
        message: RawMessage,
        inbox: &mut RawSubscription,
        timeout: Duration,
    ) -> Result<Resp>
    where
        C: Encoder<Resp>,
    {
        self.inner.transport.publish(message).await?;
        let reply = match tokio::time::timeout(timeout, inbox.next_message()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return Err(ClientError::closed()),
            Err(_) => return Err(ClientError::timeout()),
        };
        let response =
            <C as Encoder<Resp>>::decode(&self.inner.codec, &reply.subject, &reply.payload)?;
        Ok(response)
    }

    pub async fn flush(&self) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.transport.flush().await?;
        Ok(())
    }

    /// Stop every subscription and close the transport.
    ///
    /// Handler invocations already running complete; every later operation fails with a
    /// closed error. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancellation_token.cancel();
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.write().await);
        self.inner.transport.close().await;
        tracing::debug!(
            id = self.inner.id,
            subscriptions = subscriptions.len(),
            "encoded connection closed"
        );
    }
}

pub(crate) struct ConnectionInner<T, C> {
    pub(crate) id: u64,
    pub(crate) transport: T,
    pub(crate) codec: Arc<C>,
    pub(crate) config: EncodedConnectionConfig,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) subscriptions: RwLock<HashMap<SubscriptionId, CancellationToken>>,
    pub(crate) inbox_seq: AtomicU64,
    pub(crate) closed: AtomicBool,
    pub(crate) cancellation_token: CancellationToken,
}

impl<T, C> ConnectionInner<T, C>
where
    T: Transport,
    C: Codec,
{
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.transport.is_closed()
    }
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::closed());
        }
        Ok(())
    }
    pub(crate) async fn publish<M>(
        &self,
        subject: Subject,
        reply: Option<Subject>,
        value: &M,
    ) -> Result<()>
    where
        C: Encoder<M>,
    {
        self.ensure_open()?;
        let payload = self.codec.encode(&subject, value)?;
        tracing::trace!(%subject, size = payload.len(), "publish");
        let message = RawMessage {
            subject,
            reply,
            payload,
        };
        self.transport.publish(message).await?;
        Ok(())
    }
}

impl<T, C> SubscriptionRegistry for ConnectionInner<T, C>
where
    T: Transport,
    C: Codec,
{
    fn remove(&self, sid: SubscriptionId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.ensure_open()?;
            let Some(ct) = self.subscriptions.write().await.remove(&sid) else {
                return Ok(());
            };
            ct.cancel();
            self.transport.unsubscribe(sid).await?;
            tracing::debug!(%sid, "unsubscribed");
            Ok(())
        })
    }

    fn detach(&self, sid: SubscriptionId) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.subscriptions.write().await.remove(&sid).is_some() {
                tracing::debug!(%sid, "detached subscription ended by transport");
            }
        })
    }
}

impl<T, C> Drop for ConnectionInner<T, C> {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
