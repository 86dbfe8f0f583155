//! Bind plain tokio channels to subjects.
use std::sync::Arc;

use encoded_mq_model::{Codec, Encoder, Subject, Transport};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::Instrument;

use crate::{ClientError, EncodedConnection, Result, Subscription};

impl<T, C> EncodedConnection<T, C>
where
    T: Transport,
    C: Codec,
{
    /// Every value sent on the returned channel is published on `subject`.
    ///
    /// Publish failures go to the error handler. The forwarding task ends when all
    /// senders are dropped or the connection is closed.
    pub fn bind_send_channel<M>(&self, subject: impl Into<Subject>) -> Result<UnboundedSender<M>>
    where
        C: Encoder<M>,
        M: Send + Sync + 'static,
    {
        self.inner.ensure_open()?;
        let subject = subject.into();
        let (tx, mut rx) = unbounded_channel::<M>();
        let connection = Arc::downgrade(&self.inner);
        let ct = self.inner.cancellation_token.child_token();
        let span = tracing::info_span!("send_channel", %subject);
        let task = async move {
            loop {
                let value = tokio::select! {
                    biased;
                    _ = ct.cancelled() => break,
                    value = rx.recv() => match value {
                        Some(value) => value,
                        None => break,
                    }
                };
                let Some(connection) = connection.upgrade() else {
                    break;
                };
                if let Err(e) = connection.publish(subject.clone(), None, &value).await {
                    (connection.error_handler)(&e);
                    if e.is_closed() {
                        break;
                    }
                }
            }
            tracing::debug!("send channel unbound");
        }
        .instrument(span);
        tokio::spawn(task);
        Ok(tx)
    }

    /// Decoded messages of `subject` are forwarded to the returned receiver.
    pub async fn bind_recv_channel<M>(
        &self,
        subject: impl Into<Subject>,
    ) -> Result<(Subscription, UnboundedReceiver<M>)>
    where
        C: Encoder<M>,
        M: Send + 'static,
    {
        let (tx, rx) = unbounded_channel::<M>();
        let subscription = self
            .subscribe(subject, move |message: M| {
                let tx = tx.clone();
                async move {
                    if tx.send(message).is_err() {
                        tracing::trace!("receiver of bound channel is dropped");
                    }
                    Ok::<_, ClientError>(())
                }
            })
            .await?;
        Ok((subscription, rx))
    }
}
