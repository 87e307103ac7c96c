//! sv-pool: concurrency-safe pool of SSH-tunneled clients
//!
//! The pool is the sole creator, cache, and destroyer of tunnel-backed
//! clients. Lookups reuse a cached entry only when it is idle-valid,
//! lifetime-valid, and passes a liveness probe; lifetime-expired entries
//! are replaced transparently; stale entries are torn down before a new
//! client is handed out. At most one live entry exists per connection ID.

pub mod entry;
pub mod factory;
pub mod pool;

pub use entry::PooledClient;
pub use factory::{ConnectionFactory, DialSpec, TunnelFactory};
pub use pool::{ConnectionPool, TunnelPool};
