//! # tenant-repository
//!
//! A tenant-scoped generic repository with a dynamic filter and ordering engine.
//!
//! Filters and orders arrive as data (a small JSON DSL and `{property, direction}`
//! requests), are validated against a per-type member table, and run either in
//! memory or pushed down to PostgreSQL as parameterized SQL.
//!
//! ## Features
//!
//! - **Dynamic Filters**: JSON documents compiled into a typed predicate tree
//!   with `And`/`Or` combinators and nine comparison operators
//! - **Dynamic Ordering**: sort by any member named at runtime, with secondary keys
//! - **Tenant Stamping**: creates and updates stamp tenant and audit members from an
//!   explicit [`TenantContext`]
//! - **Transactional Writes**: every mutation commits or rolls back as a unit
//! - **Pagination**: page requests return the page plus the filtered total
//! - **SQL Injection Prevention**: identifiers are quoted, values are always bound
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::LazyLock;
//! use tenant_repository::{
//!     AuditFields, FieldTable, FieldType, InMemorySession, OrderRequest, PageRequest, Record,
//!     Repository, SortDirection, TenantContext,
//! };
//!
//! #[derive(Debug, Clone)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i64,
//!     audit: AuditFields,
//! }
//!
//! impl Record for Person {
//!     fn fields() -> &'static FieldTable<Self> {
//!         static FIELDS: LazyLock<FieldTable<Person>> = LazyLock::new(|| {
//!             FieldTable::builder("people")
//!                 .key("id", FieldType::Integer, |p: &Person| p.id.into())
//!                 .field("name", FieldType::Text, |p: &Person| p.name.as_str().into())
//!                 .field("age", FieldType::Integer, |p: &Person| p.age.into())
//!                 .with_audit()
//!                 .build()
//!                 .expect("person field table")
//!         });
//!         &FIELDS
//!     }
//!
//!     fn audit(&self) -> &AuditFields {
//!         &self.audit
//!     }
//!
//!     fn audit_mut(&mut self) -> &mut AuditFields {
//!         &mut self.audit
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let repo = Repository::new(InMemorySession::<Person>::new());
//! let ctx = TenantContext::new(1, 42);
//!
//! for (id, name, age) in [(1, "Bob", 25), (2, "Carol", 35), (3, "Alice", 20)] {
//!     let person = Person { id, name: name.into(), age, audit: AuditFields::default() };
//!     repo.add(&ctx, person).await?;
//! }
//!
//! let filter = r#"{
//!     "logicalOperator": "Or",
//!     "lhs": {"property": "Age", "operation": "GreaterThan", "value": 30},
//!     "rhs": {"property": "Name", "operation": "StartsWith", "value": "A"}
//! }"#;
//! let order = OrderRequest::new("name", SortDirection::Ascending);
//! let page = repo.query_json_page(filter, Some(&order), PageRequest::new(0, 10)).await?;
//!
//! assert_eq!(page.total_count, 2);
//! assert_eq!(page.data[0].name, "Alice");
//! # Ok::<(), tenant_repository::RepositoryError>(())
//! # }).unwrap();
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use tenant_repository::{PgSessionConfig, RepositoryConfig};
//!
//! let config = RepositoryConfig::builder()
//!     .max_page_size(200)   // Largest accepted pageSize (default 1000)
//!     .max_filter_depth(8)  // Deepest accepted filter document (default 32)
//!     .build();
//!
//! let pg = PgSessionConfig::builder("postgres://localhost/mydb")
//!     .max_connections(5)
//!     .caller_keys()        // Keys supplied on insert instead of generated
//!     .build();
//! ```
//!
//! ## Multi-Tenancy
//!
//! Records carry a `tenant_id` member that writes stamp from the call's
//! [`TenantContext`]. Reads are not scoped implicitly: use
//! [`Repository::get_all_for_tenant`] or combine a query with
//! [`Filter::tenant`].

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod order;
pub mod query;
pub mod record;
pub mod repository;
pub mod session;
pub mod sql;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use config::{PgSessionConfig, PgSessionConfigBuilder, RepositoryConfig, RepositoryConfigBuilder};
pub use context::TenantContext;
pub use error::{RepositoryError, Result, StoreError};
pub use filter::{Filter, FilterCompiler, LogicalOperator, Operator};
pub use order::{DynamicOrder, OrderRequest, SortDirection};
pub use query::{PageRequest, Paginated, QueryParameter, RecordQuery, TrackingMode, Window};
pub use record::{AuditFields, Field, FieldTable, FieldTableBuilder, Record};
pub use repository::Repository;
pub use session::{StoreSession, StoreTransaction};
pub use storage::{InMemorySession, PgSession};
pub use types::{FieldType, FieldValue};

// Re-export SQL utilities for advanced users
pub use sql::condition::{build_filter_clause, build_order_by_clause};
pub use sql::sanitize::{quote_identifier, validate_identifier};
