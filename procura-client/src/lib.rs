//! Procura Client
//!
//! Client side of the sync layer:
//! - [`RestClient`]: plain reqwest access to the Procura API
//! - [`ClientCacheStrategy`] implementations and the [`StrategyRegistry`]
//!   that maps endpoint patterns to them
//! - [`PersistentClientStore`]: the JSON file strategies persist into
//! - [`CachedClient`]: reads through strategies, writes then invalidates
//! - [`RelationResolver`]: related entities in both directions with picker
//!   fields resolved to labels

pub mod config;
pub mod error;
pub mod gateway;
pub mod relations;
pub mod rest;
pub mod store;
pub mod strategy;

pub use config::{ClientConfig, ConfigError, StrategyRule, StrategyKind};
pub use error::{ClientError, ClientResult};
pub use gateway::CachedClient;
pub use relations::{
    HttpRelationSource, RelationResolver, RelationSource, RelationView, ResolveOutcome,
    ResolveRequest,
};
pub use rest::{RestClient, COMPANY_HEADER};
pub use store::{PersistentClientStore, StoredValue};
pub use strategy::{
    build_strategy, compile_pattern, merge_by_id, ClientCacheStrategy, DeltaMerge, PassThrough,
    PersistentTtl, PreRequestResult, RequestContext, StrategyRegistry, SINCE_PARAM,
};
