//! Connection provisioning. A connection dropped while a command is in flight is closed
//! instead of being returned to the pool, and once its backend is known the command is
//! cancelled on the server first.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, Postgres};
use sqlx::{ConnectOptions, Connection};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Opens a fresh connection per request, for hosts that manage connections themselves.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<PgConnection, sqlx::Error>;
}

/// Connects with fixed options, bypassing any pool.
pub struct DirectConnect {
    pub options: PgConnectOptions,
}

#[async_trait]
impl ConnectionFactory for DirectConnect {
    async fn connect(&self) -> Result<PgConnection, sqlx::Error> {
        self.options.connect().await
    }
}

#[derive(Clone)]
pub enum ConnectionSource {
    Pool(PgPool),
    Factory(Arc<dyn ConnectionFactory>),
}

impl From<PgPool> for ConnectionSource {
    fn from(pool: PgPool) -> Self {
        ConnectionSource::Pool(pool)
    }
}

impl ConnectionSource {
    pub async fn acquire(&self) -> Result<ScopedConnection, sqlx::Error> {
        let inner = match self {
            ConnectionSource::Pool(pool) => Inner::Pooled(pool.acquire().await?),
            ConnectionSource::Factory(factory) => Inner::Owned(factory.connect().await?),
        };
        Ok(ScopedConnection {
            inner: Some(inner),
            finished: false,
            source: self.clone(),
            backend_pid: None,
        })
    }
}

enum Inner {
    Pooled(PoolConnection<Postgres>),
    Owned(PgConnection),
}

/// Request-scoped connection. Call [`ScopedConnection::finish`] once the command has
/// completed; otherwise the connection is discarded on drop.
pub struct ScopedConnection {
    inner: Option<Inner>,
    finished: bool,
    source: ConnectionSource,
    backend_pid: Option<i32>,
}

impl ScopedConnection {
    /// Command completed (successfully or with a database error); the connection is reusable.
    pub fn finish(mut self) {
        self.finished = true;
    }

    /// Record the server process id so an abandoned command can be cancelled.
    pub async fn track_backend(&mut self) -> Result<i32, sqlx::Error> {
        let pid: i32 = sqlx::query_scalar("select pg_backend_pid()")
            .fetch_one(&mut **self)
            .await?;
        self.backend_pid = Some(pid);
        Ok(pid)
    }

    /// Cancel the in-flight command on the server and close the connection.
    pub async fn cancel(mut self) {
        if let Some(inner) = self.inner.take() {
            cancel_and_close(&self.source, self.backend_pid, inner).await;
        }
    }
}

/// `pg_cancel_backend` runs on a second connection while the first is still open, so the
/// pid cannot have been reused by another session.
async fn cancel_and_close(source: &ConnectionSource, pid: Option<i32>, inner: Inner) {
    if let Some(pid) = pid {
        match source.acquire().await {
            Ok(mut conn) => {
                let cancelled = sqlx::query_scalar::<_, bool>("select pg_cancel_backend($1)")
                    .bind(pid)
                    .fetch_one(&mut *conn)
                    .await;
                conn.finish();
                match cancelled {
                    Ok(sent) => tracing::debug!(pid, sent, "cancel requested"),
                    Err(e) => tracing::warn!(pid, error = %e, "cancel request failed"),
                }
            }
            Err(e) => tracing::warn!(pid, error = %e, "no connection available to cancel command"),
        }
    }
    let closed = match inner {
        Inner::Pooled(c) => c.detach().close().await,
        Inner::Owned(c) => c.close().await,
    };
    if let Err(e) = closed {
        tracing::debug!(error = %e, "closing abandoned connection");
    }
}

impl Deref for ScopedConnection {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self.inner.as_ref() {
            Some(Inner::Pooled(c)) => c,
            Some(Inner::Owned(c)) => c,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self.inner.as_mut() {
            Some(Inner::Pooled(c)) => c,
            Some(Inner::Owned(c)) => c,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        if self.finished {
            return;
        }
        match (self.backend_pid, tokio::runtime::Handle::try_current()) {
            (Some(pid), Ok(handle)) => {
                tracing::debug!(pid, "cancelling abandoned command");
                let source = self.source.clone();
                handle.spawn(async move { cancel_and_close(&source, Some(pid), inner).await });
            }
            _ => {
                tracing::debug!("discarding connection with unfinished command");
                // detached connections close instead of returning to the pool
                if let Inner::Pooled(c) = inner {
                    drop(c.detach());
                }
            }
        }
    }
}
