//! Process-wide owner of the engine session.
//!
//! The session is opened lazily on the first command that needs the engine
//! and replaced only after a caller reports it broken. Reconnection is
//! single-flight: the slot is guarded by an async mutex, so concurrent callers
//! queue behind the one performing the handshake and then share its session.

use crate::engine::Connector;
use crate::error::McpError;
use crate::verbose::Timer;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub struct ConnectionManager<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    slot: Mutex<Option<Arc<C::Session>>>,
    attempts: AtomicUsize,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            slot: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Current session, opening a new one if there is none.
    pub async fn acquire(&self) -> Result<Arc<C::Session>, McpError> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(attempt, "opening engine session");
        let timer = Timer::start();

        let session = tokio::time::timeout(self.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| McpError::Connection {
                message: format!(
                    "handshake did not complete within {}s",
                    self.connect_timeout.as_secs()
                ),
            })?
            .inspect_err(|e| tracing::warn!(error = %e, "engine session failed"))?;

        tracing::info!(elapsed_ms = timer.elapsed_ms() as u64, "engine session ready");
        let session = Arc::new(session);
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drop `failed` so the next `acquire` reconnects.
    ///
    /// A session that has already been replaced is left alone, so a caller
    /// holding a stale handle cannot discard a fresh one.
    pub async fn mark_broken(&self, failed: &Arc<C::Session>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
            *slot = None;
            tracing::warn!("engine session marked broken");
        }
    }

    /// Whether a session is currently held.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Number of handshakes attempted so far.
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}
