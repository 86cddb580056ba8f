//! Server cache layer.
//!
//! One [`ResourceLoader`] per logical domain (schemas, companies, record
//! lists, single records). Each loader owns its [`CacheStore`]; stores are
//! created at process start and handed around explicitly, never reached
//! through globals.
//!
//! Reads return [`CacheRead<T>`] so callers can see whether a value came from
//! the cache and how old it is:
//!
//! ```ignore
//! let read = loader
//!     .load(CacheKey::scoped(&scope, ["all"]), config.schema_ttl, || async move {
//!         source.list_schemas(&scope).await
//!     })
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!(age = ?read.staleness(), "served from cache");
//! }
//! ```

pub mod config;
pub mod freshness;
pub mod key;
pub mod loader;
pub mod store;
pub mod traits;

pub use config::CacheConfig;
pub use freshness::{CacheEntry, CacheRead};
pub use key::CacheKey;
pub use loader::ResourceLoader;
pub use store::CacheStore;
pub use traits::{CacheDomain, CacheStats};
