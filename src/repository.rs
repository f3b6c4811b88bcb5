//! Tenant-scoped generic repository
//!
//! [`Repository`] orchestrates CRUD and queries for one record type over a
//! [`StoreSession`]:
//!
//! - Creates and updates require a [`TenantContext`] with both identifiers and
//!   stamp `tenant_id`, `updated_by` and `updated_at` on every record
//!   (`created_by` and `created_at` too when creating).
//! - Every mutation runs as `begin → apply → commit`. On any store failure the
//!   transaction is rolled back and the error is returned as
//!   [`RepositoryError::StoreFailure`] naming the operation. Tracked entries are
//!   detached afterwards either way.
//! - Filters, orders and page requests are validated before any store I/O.
//!
//! [`get_all`](Repository::get_all) is an unscoped, administrative read;
//! [`get_all_for_tenant`](Repository::get_all_for_tenant) restricts the result
//! to the caller's tenant.

use std::marker::PhantomData;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::config::RepositoryConfig;
use crate::context::TenantContext;
use crate::error::{RepositoryError, Result, StoreError};
use crate::filter::{Filter, FilterCompiler};
use crate::order::{DynamicOrder, OrderRequest};
use crate::query::{PageRequest, Paginated, QueryParameter, RecordQuery, TrackingMode};
use crate::record::Record;
use crate::session::{StoreSession, StoreTransaction};
use crate::sql::sanitize::{validate_identifier, validate_procedure_name};
use crate::types::{FieldType, FieldValue};

enum Mutation<'a, T> {
    Insert(Vec<T>),
    Update(Vec<T>),
    Delete(&'a [T]),
}

enum Applied<T> {
    Records(Vec<T>),
    Deleted(u64),
}

impl<T> Applied<T> {
    fn count(&self) -> u64 {
        match self {
            Applied::Records(records) => records.len() as u64,
            Applied::Deleted(count) => *count,
        }
    }
}

/// Generic repository for `T` over the store session `S`
pub struct Repository<T, S> {
    session: S,
    config: RepositoryConfig,
    compiler: FilterCompiler,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> Repository<T, S>
where
    T: Record,
    S: StoreSession<T>,
{
    /// Create a repository with the default configuration
    pub fn new(session: S) -> Self {
        Self::with_config(session, RepositoryConfig::default())
    }

    pub fn with_config(session: S, config: RepositoryConfig) -> Self {
        Self {
            compiler: FilterCompiler::with_max_depth(config.max_filter_depth),
            session,
            config,
            _record: PhantomData,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert one record, returning it as stored
    pub async fn add(&self, ctx: &TenantContext, mut record: T) -> Result<T> {
        let (tenant_id, user_id) = ctx.require()?;
        debug!(operation = "inserting", record = record_name::<T>(), tenant_id, "adding record");

        record.audit_mut().stamp_created(tenant_id, user_id, Utc::now());

        match self.save("inserting", Mutation::Insert(vec![record])).await? {
            Applied::Records(records) => single("inserting", records),
            Applied::Deleted(_) => Err(unexpected("inserting")),
        }
    }

    /// Insert many records in one transaction, returning the number inserted
    pub async fn bulk_insert(&self, ctx: &TenantContext, mut records: Vec<T>) -> Result<u64> {
        let (tenant_id, user_id) = ctx.require()?;
        if records.is_empty() {
            return Ok(0);
        }
        debug!(
            operation = "bulk insert",
            record = record_name::<T>(),
            tenant_id,
            count = records.len(),
            "inserting records"
        );

        let now = Utc::now();
        for record in &mut records {
            record.audit_mut().stamp_created(tenant_id, user_id, now);
        }

        Ok(self.save("bulk insert", Mutation::Insert(records)).await?.count())
    }

    /// Replace one record by key, returning it as stored
    pub async fn update(&self, ctx: &TenantContext, mut record: T) -> Result<T> {
        let (tenant_id, user_id) = ctx.require()?;
        debug!(operation = "updating", record = record_name::<T>(), tenant_id, "updating record");

        record.audit_mut().stamp_updated(tenant_id, user_id, Utc::now());

        match self.save("updating", Mutation::Update(vec![record])).await? {
            Applied::Records(records) => single("updating", records),
            Applied::Deleted(_) => Err(unexpected("updating")),
        }
    }

    /// Replace many records in one transaction. Either all are written or none.
    pub async fn bulk_update(&self, ctx: &TenantContext, mut records: Vec<T>) -> Result<u64> {
        let (tenant_id, user_id) = ctx.require()?;
        if records.is_empty() {
            return Ok(0);
        }
        debug!(
            operation = "bulk update",
            record = record_name::<T>(),
            tenant_id,
            count = records.len(),
            "updating records"
        );

        let now = Utc::now();
        for record in &mut records {
            record.audit_mut().stamp_updated(tenant_id, user_id, now);
        }

        Ok(self.save("bulk update", Mutation::Update(records)).await?.count())
    }

    /// Delete one record by key. Needs no tenant context.
    pub async fn delete(&self, record: &T) -> Result<u64> {
        debug!(operation = "deleting", record = record_name::<T>(), "deleting record");

        let applied = self
            .save("deleting", Mutation::Delete(std::slice::from_ref(record)))
            .await?;
        Ok(applied.count())
    }

    pub async fn bulk_delete(&self, records: &[T]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        debug!(
            operation = "bulk delete",
            record = record_name::<T>(),
            count = records.len(),
            "deleting records"
        );

        Ok(self.save("bulk delete", Mutation::Delete(records)).await?.count())
    }

    async fn save(&self, operation: &'static str, mutation: Mutation<'_, T>) -> Result<Applied<T>> {
        let mut tx = self
            .session
            .begin()
            .await
            .map_err(|e| self.fail(operation, e))?;

        let outcome = match Self::apply(&mut tx, mutation).await {
            Ok(applied) => tx.commit().await.map(|()| applied),
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(applied) => {
                debug!(
                    operation,
                    record = record_name::<T>(),
                    count = applied.count(),
                    "committed"
                );
                Ok(applied)
            }
            Err(e) => {
                warn!(operation, record = record_name::<T>(), error = %e, "rolling back");
                match tx.rollback().await {
                    Ok(()) | Err(StoreError::TransactionClosed) => {}
                    Err(rollback) => {
                        error!(operation, error = %rollback, "rollback failed");
                    }
                }
                Err(self.fail(operation, e))
            }
        };

        self.session.detach_all();
        result
    }

    async fn apply(
        tx: &mut S::Transaction,
        mutation: Mutation<'_, T>,
    ) -> std::result::Result<Applied<T>, StoreError> {
        match mutation {
            Mutation::Insert(records) => tx.insert(records).await.map(Applied::Records),
            Mutation::Update(records) => tx.update(records).await.map(Applied::Records),
            Mutation::Delete(records) => tx.delete(records).await.map(Applied::Deleted),
        }
    }

    fn fail(&self, operation: &'static str, e: StoreError) -> RepositoryError {
        error!(operation, record = record_name::<T>(), error = %e, "store failure");
        RepositoryError::store(operation, e)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look a record up by its key. The session may track the lookup; the
    /// record is detached before it is returned.
    pub async fn find_by_key(&self, key: impl Into<FieldValue>) -> Result<Option<T>> {
        let key = key.into();
        debug!(operation = "find by key", record = record_name::<T>(), %key, "finding record");

        self.find_detached("find by key", &key).await
    }

    /// Look a record up by an integer key
    pub async fn get_by_id(&self, id: i64) -> Result<Option<T>> {
        let key_field = T::fields().key_field();
        if key_field.field_type() != FieldType::Integer {
            return Err(RepositoryError::type_mismatch(
                key_field.name(),
                key_field.field_type().name(),
                FieldType::Integer.name(),
            ));
        }
        debug!(operation = "get by id", record = record_name::<T>(), id, "finding record");

        self.find_detached("get by id", &FieldValue::Integer(id)).await
    }

    async fn find_detached(&self, operation: &'static str, key: &FieldValue) -> Result<Option<T>> {
        let found = self.session.find(key, TrackingMode::Tracked).await;
        self.session.detach_all();
        found.map_err(|e| self.fail(operation, e))
    }

    /// Every record in the store, across all tenants
    pub async fn get_all(&self) -> Result<Vec<T>> {
        debug!(operation = "get all", record = record_name::<T>(), "fetching all records");

        self.session
            .fetch_all(TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("get all", e))
    }

    /// Every record owned by the caller's tenant
    pub async fn get_all_for_tenant(&self, ctx: &TenantContext) -> Result<Vec<T>> {
        let tenant_id = ctx.tenant()?;
        let query = RecordQuery::new(Filter::tenant(tenant_id)?);
        debug!(
            operation = "get all",
            record = record_name::<T>(),
            tenant_id,
            "fetching tenant records"
        );

        self.session
            .fetch(&query, None, TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("get all", e))
    }

    /// Records matching a filter, in the query's order
    pub async fn query(&self, query: impl Into<RecordQuery<T>>) -> Result<Vec<T>> {
        let query = query.into();
        debug!(
            operation = "query",
            record = record_name::<T>(),
            filter = %query.filter,
            "querying"
        );

        self.session
            .fetch(&query, None, TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("query", e))
    }

    /// One page of matching records plus the size of the whole filtered set
    pub async fn query_page(
        &self,
        query: impl Into<RecordQuery<T>>,
        page: PageRequest,
    ) -> Result<Paginated<T>> {
        let query = query.into();
        let window = page.validate(self.config.max_page_size)?;
        debug!(
            operation = "query with pagination",
            record = record_name::<T>(),
            filter = %query.filter,
            page_index = page.page_index,
            page_size = page.page_size,
            "querying page"
        );

        let total_count = self
            .session
            .count(&query.filter)
            .await
            .map_err(|e| self.fail("query with pagination", e))?;
        let data = self
            .session
            .fetch(&query, Some(window), TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("query with pagination", e))?;

        Ok(Paginated { data, total_count })
    }

    /// Compile a JSON filter document and optional order request
    pub fn compile(&self, filter: &str, order: Option<&OrderRequest>) -> Result<RecordQuery<T>> {
        let mut query = RecordQuery::new(self.compiler.compile_str(filter)?);
        if let Some(order) = order {
            query = query.order_by(DynamicOrder::from_request(order)?);
        }
        Ok(query)
    }

    /// [`query`](Self::query) with a JSON filter document
    pub async fn query_json(&self, filter: &str, order: Option<&OrderRequest>) -> Result<Vec<T>> {
        let query = self.compile(filter, order)?;
        self.query(query).await
    }

    /// [`query_page`](Self::query_page) with a JSON filter document
    pub async fn query_json_page(
        &self,
        filter: &str,
        order: Option<&OrderRequest>,
        page: PageRequest,
    ) -> Result<Paginated<T>> {
        let query = self.compile(filter, order)?;
        self.query_page(query, page).await
    }

    // =========================================================================
    // Raw passthrough
    // =========================================================================

    /// Call a set-returning procedure with named parameters.
    ///
    /// The procedure name (optionally `schema.procedure`) and every parameter
    /// name must be plain lowercase identifiers. Values are always bound.
    pub async fn execute_procedure(&self, name: &str, params: &[QueryParameter]) -> Result<Vec<T>> {
        validate_procedure_name(name).map_err(RepositoryError::InvalidIdentifier)?;
        for param in params {
            validate_identifier(&param.name).map_err(RepositoryError::InvalidIdentifier)?;
        }
        debug!(
            operation = "execute procedure",
            record = record_name::<T>(),
            procedure = name,
            "calling procedure"
        );

        self.session
            .execute_procedure(name, params, TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("execute procedure", e))
    }

    /// Run caller-written SQL. Parameters bind to `$1`, `$2`, … in order.
    ///
    /// The text is passed through untouched; it must not interpolate caller
    /// input.
    pub async fn execute_raw(&self, query: &str, params: &[QueryParameter]) -> Result<Vec<T>> {
        debug!(
            operation = "execute raw",
            record = record_name::<T>(),
            params = params.len(),
            "executing raw query"
        );

        self.session
            .execute_raw(query, params, TrackingMode::Untracked)
            .await
            .map_err(|e| self.fail("execute raw", e))
    }
}

fn record_name<T: Record>() -> &'static str {
    T::fields().record_name()
}

fn single<T>(operation: &'static str, records: Vec<T>) -> Result<T> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| unexpected(operation))
}

fn unexpected(operation: &'static str) -> RepositoryError {
    RepositoryError::store(
        operation,
        StoreError::backend("store returned no record for the write"),
    )
}
