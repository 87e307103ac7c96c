//! Connection cache with expiry, probing and transparent redial
//!
//! The pool keeps at most one live client per connection id. Lookups for
//! the same id serialize on a per-slot lock, so a burst of callers racing
//! on a cold id produces exactly one dial and everyone shares the result.
//! Lookups for distinct ids do not block each other; the outer map lock is
//! only held long enough to clone a slot handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use sv_core::config::PoolConfig;
use sv_core::error::{PoolError, TunnelError};
use sv_core::types::ConnectionId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::entry::PoolEntry;
use crate::factory::{ConnectionFactory, DialSpec, TunnelFactory};

/// Pool specialized to real SSH tunnels
pub type TunnelPool = ConnectionPool<TunnelFactory>;

/// One cache slot, locked independently of the rest of the pool
struct Slot<C> {
    state: Mutex<Option<PoolEntry<C>>>,
}

impl<C> Slot<C> {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    slots: Mutex<HashMap<ConnectionId, Arc<Slot<F::Client>>>>,
    generation: AtomicU64,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            slots: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    async fn slot(&self, id: &ConnectionId) -> Arc<Slot<F::Client>> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    /// Fetch the client for `spec.id`, dialing or redialing as needed.
    ///
    /// A cached entry past its lifetime or idle window is replaced in
    /// place; one that fails its liveness probe is dropped and redialed.
    /// Either way the caller gets a working client or an error, never a
    /// stale one.
    pub async fn get(&self, spec: &DialSpec) -> Result<F::Client, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        let slot = self.slot(&spec.id).await;
        let mut state = slot.state.lock().await;

        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        if let Some(entry) = state.as_mut() {
            let lifetime_expired = self.config.lifetime_enabled()
                && entry.created_at.elapsed() >= self.config.max_lifetime;
            let idle_expired = self.config.idle_enabled()
                && entry.last_used.elapsed() >= self.config.max_idle;

            if !lifetime_expired && !idle_expired && self.factory.probe(&entry.client).await {
                entry.last_used = Instant::now();
                return Ok(entry.client.clone());
            }

            // Expired or unresponsive: replace without surfacing anything
            // to the caller beyond the cost of a fresh dial.
            let stale = state.take();
            let result = self.dial_into(&mut *state, spec).await;
            drop(state);
            if let Some(old) = stale {
                tracing::debug!(id = %spec.id, generation = old.generation, "replacing pooled connection");
                self.factory.teardown(old.client).await;
            }
            return result;
        }

        self.dial_into(&mut *state, spec).await
    }

    async fn dial_into(
        &self,
        state: &mut Option<PoolEntry<F::Client>>,
        spec: &DialSpec,
    ) -> Result<F::Client, PoolError> {
        tracing::debug!(id = %spec.id, host = %spec.host, "dialing new pooled connection");
        let client = self.factory.dial(spec).await?;
        let entry = PoolEntry::new(client.clone(), self.next_generation());
        *state = Some(entry);
        Ok(client)
    }

    /// Drop and close the cached connection for `id`, if any.
    pub async fn remove(&self, id: &ConnectionId) {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(id).cloned()
        };
        let Some(slot) = slot else { return };
        let stale = slot.state.lock().await.take();
        if let Some(old) = stale {
            tracing::debug!(id = %id, generation = old.generation, "removing pooled connection");
            self.factory.teardown(old.client).await;
        }
    }

    /// Dial a throwaway connection to verify the target is reachable.
    ///
    /// Nothing is cached; the connection is closed before returning.
    pub async fn test_connection(&self, spec: &DialSpec) -> Result<(), PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        let client = self.factory.dial(spec).await?;
        let alive = self.factory.probe(&client).await;
        self.factory.teardown(client).await;
        if alive {
            Ok(())
        } else {
            Err(PoolError::Tunnel(TunnelError::Session(
                "connection test probe failed".to_string(),
            )))
        }
    }

    /// Close every cached connection and refuse further lookups.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();

        let slots: Vec<_> = {
            let mut map = self.slots.lock().await;
            map.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            let stale = slot.state.lock().await.take();
            if let Some(old) = stale {
                self.factory.teardown(old.client).await;
            }
        }
        tracing::info!("connection pool closed");
    }

    /// Spawn the background task that periodically evicts expired entries.
    pub fn start_reaper(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pool.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(pool.config.reap_interval) => {
                        pool.reap().await;
                    }
                }
            }
        });
    }

    /// One sweep over the cache.
    ///
    /// Idle-expired entries are closed. Lifetime-expired entries are only
    /// closed when they have also sat untouched for a full reap interval;
    /// one still in active use is left for [`get`](Self::get) to replace
    /// on its next acquisition, so callers never lose a connection out
    /// from under them between uses.
    pub async fn reap(&self) {
        let slots: Vec<_> = {
            let map = self.slots.lock().await;
            map.iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };

        for (id, slot) in slots {
            let stale = {
                let mut state = slot.state.lock().await;
                let Some(entry) = state.as_ref() else { continue };

                let idle_expired = self.config.idle_enabled()
                    && entry.last_used.elapsed() >= self.config.max_idle;
                let lifetime_expired = self.config.lifetime_enabled()
                    && entry.created_at.elapsed() >= self.config.max_lifetime
                    && entry.last_used.elapsed() >= self.config.reap_interval;

                if idle_expired || lifetime_expired {
                    state.take()
                } else {
                    None
                }
            };
            if let Some(old) = stale {
                tracing::debug!(id = %id, generation = old.generation, "reaping expired connection");
                self.factory.teardown(old.client).await;
            }
        }
    }
}
