//! Bounded TCP listeners.
//!
//! The plain and TLS listeners draw from one [`ConnectionLimit`], so
//! `max_connections` caps the whole server rather than each port. A slot is
//! taken before `accept` and held by the connection task until it ends.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limit closed")]
    Closed,
}

/// Server-wide budget of open connections.
#[derive(Debug, Clone)]
pub struct ConnectionLimit {
    slots: Arc<Semaphore>,
}

impl ConnectionLimit {
    pub fn new(max_connections: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Slots not held by any connection.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, ListenerError> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)
    }
}

/// A TCP listener that waits for a free slot before accepting.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    limit: ConnectionLimit,
}

impl Listener {
    /// Bind `address` (`ip:port`), drawing slots from `limit`.
    pub async fn bind(address: &str, limit: ConnectionLimit) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: address.to_string(),
            source,
        };
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| bind_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let inner = TcpListener::bind(addr).await.map_err(bind_error)?;

        tracing::debug!(address = %addr, available = limit.available(), "Listener bound");
        Ok(Self { inner, limit })
    }

    /// Next connection plus the slot it occupies. Dropping the permit frees the slot.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, OwnedSemaphorePermit), ListenerError> {
        let permit = self.limit.acquire().await?;
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        Ok((stream, peer, permit))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
