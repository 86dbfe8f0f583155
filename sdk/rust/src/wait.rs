//! Bounded waits.
use std::{future::Future, time::Duration};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::{ClientError, Result};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for `future` at most `timeout`.
pub async fn wait<F: Future>(future: F, timeout: Duration) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ClientError::timeout())
}

pub async fn wait_default<F: Future>(future: F) -> Result<F::Output> {
    wait(future, DEFAULT_WAIT_TIMEOUT).await
}

/// Wait for the next signal on `rx`, a closed channel is reported as closed.
pub async fn wait_for<T>(rx: &mut UnboundedReceiver<T>, timeout: Duration) -> Result<T> {
    wait(rx.recv(), timeout).await?.ok_or_else(ClientError::closed)
}
