//! Named TTL cache pools with LRU-style eviction, a registry owning them,
//! and a memoization wrapper for expensive producers.

pub mod memoize;
pub mod pool;
pub mod registry;

pub use memoize::Memoizer;
pub use pool::{CachePool, PoolStats};
pub use registry::{CacheRegistry, HostClearHook};
