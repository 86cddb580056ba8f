use std::time::Duration;

/// TTLs for the server cache domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for schema metadata (single schemas and the full list).
    pub schema_ttl: Duration,
    /// TTL for the company list.
    pub company_ttl: Duration,
    /// TTL for record lists and single records.
    pub resource_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_ttl: Duration::from_secs(300),
            company_ttl: Duration::from_secs(300),
            resource_ttl: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema_ttl(mut self, ttl: Duration) -> Self {
        self.schema_ttl = ttl;
        self
    }

    pub fn with_company_ttl(mut self, ttl: Duration) -> Self {
        self.company_ttl = ttl;
        self
    }

    pub fn with_resource_ttl(mut self, ttl: Duration) -> Self {
        self.resource_ttl = ttl;
        self
    }
}
