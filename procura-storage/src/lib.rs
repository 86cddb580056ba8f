//! Procura Storage - Cache and Data Source Layer
//!
//! TTL cache domains with fetch coalescing, fan-out invalidation, the
//! [`DataSource`] abstraction, and the flat JSON store used in demo mode.

pub mod cache;
pub mod invalidation;
pub mod json_store;
pub mod source;

pub use cache::{
    CacheConfig, CacheDomain, CacheEntry, CacheKey, CacheRead, CacheStats, CacheStore,
    ResourceLoader,
};
pub use invalidation::{
    DomainClearStatus, InvalidationCoordinator, InvalidationReport, PageRevalidationStatus,
    PageRevalidator, RemoteCachePeer, RevalidationPlan, RevalidationTargets, SchemaPageTargets,
    StorageMode,
};
pub use json_store::{JsonStore, StoreData};
pub use source::DataSource;
