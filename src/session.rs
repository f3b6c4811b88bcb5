//! Store collaborator traits
//!
//! A [`StoreSession`] is the queryable, transactional surface a
//! [`Repository`](crate::Repository) runs against. Sessions report failures as
//! [`StoreError`]; the repository wraps them with the operation name.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::query::{QueryParameter, RecordQuery, TrackingMode, Window};
use crate::record::Record;
use crate::types::FieldValue;

/// An open unit of work. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTransaction<T: Record>: Send {
    /// Insert records, returning them as stored (generated keys filled in)
    async fn insert(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError>;

    /// Replace records by key. A missing key is `NotFound`.
    async fn update(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError>;

    /// Delete records by key, returning the number removed
    async fn delete(&mut self, records: &[T]) -> Result<u64, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Queryable, transactional record store for `T`
#[async_trait]
pub trait StoreSession<T: Record>: Send + Sync {
    type Transaction: StoreTransaction<T>;

    /// Open a transaction. One per call chain.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;

    /// Look a record up by key
    async fn find(&self, key: &FieldValue, mode: TrackingMode) -> Result<Option<T>, StoreError>;

    /// Filter, order and window records
    async fn fetch(
        &self,
        query: &RecordQuery<T>,
        window: Option<Window>,
        mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError>;

    /// Size of the filtered set
    async fn count(&self, filter: &Filter<T>) -> Result<u64, StoreError>;

    /// Every record the store holds
    async fn fetch_all(&self, mode: TrackingMode) -> Result<Vec<T>, StoreError>;

    async fn execute_procedure(
        &self,
        name: &str,
        params: &[QueryParameter],
        mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError>;

    async fn execute_raw(
        &self,
        query: &str,
        params: &[QueryParameter],
        mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError>;

    /// Drop every tracked entry
    fn detach_all(&self);
}
