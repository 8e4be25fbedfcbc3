//! Scoped connection pooling.
//!
//! A fixed number of connections is opened up front. [`ConnectionPool::acquire`]
//! hands one out as a [`PooledConnection`] guard that puts it back when
//! dropped, on every exit path.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Error, Result};

/// Default time to wait for a free connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections opened.
    pub capacity: usize,
    /// Timeout for acquiring a connection from the pool.
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(crossq_core::config::DEFAULT_POOL_CAPACITY)
    }
}

/// A fixed-size pool of connections.
pub struct ConnectionPool<C> {
    idle: Mutex<Vec<C>>,
    returned: Condvar,
    config: PoolConfig,
}

impl<C> ConnectionPool<C> {
    /// Open `config.capacity` connections with `connect`.
    pub fn open<F>(config: PoolConfig, mut connect: F) -> Result<Self>
    where
        F: FnMut() -> Result<C>,
    {
        if config.capacity == 0 {
            return Err(Error::Pool("capacity must be greater than 0".to_string()));
        }
        let connections = (0..config.capacity)
            .map(|_| connect())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            idle: Mutex::new(connections),
            returned: Condvar::new(),
            config,
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Connections not currently handed out.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Take a connection, waiting up to the acquire timeout for one to be returned.
    pub fn acquire(&self) -> Result<PooledConnection<'_, C>> {
        let mut idle = self.idle.lock();
        while idle.is_empty() {
            if self
                .returned
                .wait_for(&mut idle, self.config.acquire_timeout)
                .timed_out()
                && idle.is_empty()
            {
                return Err(Error::Pool("timeout waiting for connection".to_string()));
            }
        }
        let connection = idle.pop();
        trace!(idle = idle.len(), "acquired connection");
        Ok(PooledConnection {
            connection,
            pool: self,
        })
    }

    /// Run `f` with a connection held only for the duration of the call.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut C) -> Result<T>,
    {
        let mut connection = self.acquire()?;
        f(&mut connection)
    }

    fn release(&self, connection: C) {
        self.idle.lock().push(connection);
        self.returned.notify_one();
    }
}

/// A pooled connection that returns itself to the pool when dropped.
pub struct PooledConnection<'a, C> {
    connection: Option<C>,
    pool: &'a ConnectionPool<C>,
}

impl<C> Deref for PooledConnection<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        match &self.connection {
            Some(c) => c,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl<C> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        match &mut self.connection {
            Some(c) => c,
            None => unreachable!("connection taken before drop"),
        }
    }
}

impl<C> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
