//! Configuration for the repository and the Postgres session
//!
//! Provides a builder pattern for both.

/// Default upper bound on `pageSize`
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

/// Default maximum nesting depth of a JSON filter document
pub const DEFAULT_MAX_FILTER_DEPTH: usize = 32;

/// Configuration for [`Repository`](crate::Repository)
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Largest accepted page size (default: 1000)
    pub max_page_size: u32,
    /// Deepest accepted filter document (default: 32)
    pub max_filter_depth: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_filter_depth: DEFAULT_MAX_FILTER_DEPTH,
        }
    }
}

impl RepositoryConfig {
    /// Create a new configuration builder
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }
}

/// Builder for RepositoryConfig
#[derive(Debug, Default)]
pub struct RepositoryConfigBuilder {
    config: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    /// Set the largest accepted page size
    pub fn max_page_size(mut self, size: u32) -> Self {
        self.config.max_page_size = size;
        self
    }

    /// Set the deepest accepted filter document
    pub fn max_filter_depth(mut self, depth: usize) -> Self {
        self.config.max_filter_depth = depth;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RepositoryConfig {
        self.config
    }
}

/// Configuration for [`PgSession`](crate::storage::postgres::PgSession)
#[derive(Debug, Clone)]
pub struct PgSessionConfig {
    /// PostgreSQL database URL
    pub database_url: String,
    /// Pool size (default: 10)
    pub max_connections: u32,
    /// Whether the key column is generated by the database (default: true).
    ///
    /// When set, the key is left out of `INSERT` and read back with `RETURNING`.
    pub generated_keys: bool,
}

impl PgSessionConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> PgSessionConfigBuilder {
        PgSessionConfigBuilder::new(database_url)
    }
}

/// Builder for PgSessionConfig
#[derive(Debug)]
pub struct PgSessionConfigBuilder {
    database_url: String,
    max_connections: u32,
    generated_keys: bool,
}

impl PgSessionConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            generated_keys: true,
        }
    }

    /// Set the pool size (default: 10)
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Enable or disable database-generated keys (default: true)
    pub fn generated_keys(mut self, enabled: bool) -> Self {
        self.generated_keys = enabled;
        self
    }

    /// Keys are supplied by the caller on insert
    pub fn caller_keys(mut self) -> Self {
        self.generated_keys = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PgSessionConfig {
        PgSessionConfig {
            database_url: self.database_url,
            max_connections: self.max_connections,
            generated_keys: self.generated_keys,
        }
    }
}
