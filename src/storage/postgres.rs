//! PostgreSQL store session
//!
//! Filters and orders are pushed down as parameterized SQL. Rows are decoded by
//! selecting `to_jsonb(t.*)` and deserializing the JSON object into `T`, so a
//! record's serde field names must match its table's column names.
//!
//! Postgres keeps no client-side tracking set: [`TrackingMode`] is accepted and
//! ignored, and [`StoreSession::detach_all`] does nothing.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::config::PgSessionConfig;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::query::{QueryParameter, RecordQuery, TrackingMode, Window};
use crate::record::{Field, Record, CREATED_AT_COLUMN, CREATED_BY_COLUMN};
use crate::session::{StoreSession, StoreTransaction};
use crate::sql::condition::{build_filter_clause, build_order_by_clause};
use crate::sql::sanitize::{quote_identifier, quote_qualified};
use crate::types::{FieldType, FieldValue};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Store session over a PostgreSQL connection pool
pub struct PgSession<T> {
    /// Database connection pool
    pool: PgPool,
    /// Session configuration
    config: PgSessionConfig,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for PgSession<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            config: self.config.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record + DeserializeOwned> PgSession<T> {
    /// Connect a new pool from configuration
    pub async fn connect(config: PgSessionConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self::from_pool(pool, config))
    }

    /// Share an existing pool
    pub fn from_pool(pool: PgPool, config: PgSessionConfig) -> Self {
        Self {
            pool,
            config,
            _record: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PgSessionConfig {
        &self.config
    }

    fn select_sql(where_clause: &str, order_by: &str) -> String {
        format!(
            "SELECT to_jsonb(t.*) AS record FROM {} AS t WHERE {} ORDER BY {}",
            table::<T>(),
            where_clause,
            order_by
        )
    }

    async fn fetch_rows(&self, query: PgQuery<'_>) -> Result<Vec<T>, StoreError> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }
}

fn table<T: Record>() -> String {
    quote_qualified(T::fields().table())
}

fn row_to_record<T: DeserializeOwned>(row: &PgRow) -> Result<T, StoreError> {
    let record: serde_json::Value = row.try_get("record")?;
    Ok(serde_json::from_value(record)?)
}

/// Bind a value; nulls are bound with the member's SQL type
fn bind_value<'q>(query: PgQuery<'q>, value: &FieldValue, null_type: FieldType) -> PgQuery<'q> {
    match value {
        FieldValue::Null => match null_type {
            FieldType::Integer => query.bind(None::<i64>),
            FieldType::Decimal => query.bind(None::<rust_decimal::Decimal>),
            FieldType::Text => query.bind(None::<String>),
            FieldType::Boolean => query.bind(None::<bool>),
            FieldType::Timestamp => query.bind(None::<chrono::DateTime<chrono::Utc>>),
            FieldType::Uuid => query.bind(None::<uuid::Uuid>),
        },
        FieldValue::Integer(v) => query.bind(*v),
        FieldValue::Decimal(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::Boolean(v) => query.bind(*v),
        FieldValue::Timestamp(v) => query.bind(*v),
        FieldValue::Uuid(v) => query.bind(*v),
    }
}

/// Bind filter literals; these are never null, so their own type is used
fn bind_values<'q>(query: PgQuery<'q>, values: &[FieldValue]) -> PgQuery<'q> {
    values.iter().fold(query, |query, value| {
        bind_value(query, value, value.field_type().unwrap_or(FieldType::Text))
    })
}

/// Bind raw and procedure parameters with their declared types
fn bind_parameters<'q>(query: PgQuery<'q>, params: &[QueryParameter]) -> PgQuery<'q> {
    params.iter().fold(query, |query, param| {
        bind_value(query, &param.value, param.field_type)
    })
}

fn bind_record<'q, T>(query: PgQuery<'q>, fields: &[&Field<T>], record: &T) -> PgQuery<'q> {
    fields.iter().fold(query, |query, field| {
        bind_value(query, &field.get(record), field.field_type())
    })
}

fn is_creation_stamp<T>(field: &Field<T>) -> bool {
    matches!(field.name(), CREATED_BY_COLUMN | CREATED_AT_COLUMN)
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn limit_param(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl<T: Record + DeserializeOwned> StoreSession<T> for PgSession<T> {
    type Transaction = PgTransaction<T>;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction {
            tx: Some(tx),
            generated_keys: self.config.generated_keys,
            _record: PhantomData,
        })
    }

    async fn find(&self, key: &FieldValue, _mode: TrackingMode) -> Result<Option<T>, StoreError> {
        let key_field = T::fields().key_field();
        let sql = format!(
            "SELECT to_jsonb(t.*) AS record FROM {} AS t WHERE {} = $1 LIMIT 1",
            table::<T>(),
            quote_identifier(key_field.column())
        );

        let row = bind_value(sqlx::query(&sql), key, key_field.field_type())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn fetch(
        &self,
        query: &RecordQuery<T>,
        window: Option<Window>,
        _mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        let mut param_offset = 1;
        let (where_clause, params) = build_filter_clause(&query.filter, &mut param_offset);
        let mut sql = Self::select_sql(&where_clause, &build_order_by_clause(query.order.as_ref()));

        let Some(window) = window else {
            return self.fetch_rows(bind_values(sqlx::query(&sql), &params)).await;
        };

        sql.push_str(&format!(
            " LIMIT ${} OFFSET ${}",
            param_offset,
            param_offset + 1
        ));

        let select = bind_values(sqlx::query(&sql), &params)
            .bind(limit_param(window.limit))
            .bind(limit_param(window.offset));

        self.fetch_rows(select).await
    }

    async fn count(&self, filter: &Filter<T>) -> Result<u64, StoreError> {
        let mut param_offset = 1;
        let (where_clause, params) = build_filter_clause(filter, &mut param_offset);
        let sql = format!(
            "SELECT COUNT(*) FROM {} AS t WHERE {}",
            table::<T>(),
            where_clause
        );

        let row = bind_values(sqlx::query(&sql), &params)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get(0)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn fetch_all(&self, _mode: TrackingMode) -> Result<Vec<T>, StoreError> {
        let sql = Self::select_sql("TRUE", &build_order_by_clause::<T>(None));
        self.fetch_rows(sqlx::query(&sql)).await
    }

    async fn execute_procedure(
        &self,
        name: &str,
        params: &[QueryParameter],
        _mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        let arguments = params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} => ${}", quote_identifier(&p.name), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT to_jsonb(r.*) AS record FROM {}({}) AS r",
            quote_qualified(name),
            arguments
        );

        tracing::debug!(procedure = name, params = params.len(), "calling procedure");

        self.fetch_rows(bind_parameters(sqlx::query(&sql), params)).await
    }

    async fn execute_raw(
        &self,
        query: &str,
        params: &[QueryParameter],
        _mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        let sql = format!(
            "SELECT to_jsonb(r.*) AS record FROM ({}) AS r",
            query.trim().trim_end_matches(';')
        );

        tracing::debug!(params = params.len(), "executing raw query");

        self.fetch_rows(bind_parameters(sqlx::query(&sql), params)).await
    }

    fn detach_all(&self) {}
}

/// Transaction over a [`PgSession`]
pub struct PgTransaction<T> {
    tx: Option<Transaction<'static, Postgres>>,
    generated_keys: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T> PgTransaction<T> {
    fn open(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl<T: Record + DeserializeOwned> StoreTransaction<T> for PgTransaction<T> {
    async fn insert(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError> {
        let generated_keys = self.generated_keys;
        let columns: Vec<&Field<T>> = T::fields()
            .fields()
            .iter()
            .filter(|f| !(generated_keys && f.is_key()))
            .collect();

        let sql = format!(
            "INSERT INTO {} AS t ({}) VALUES ({}) RETURNING to_jsonb(t.*) AS record",
            table::<T>(),
            columns
                .iter()
                .map(|f| quote_identifier(f.column()))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders(1, columns.len())
        );

        let tx = self.open()?;
        let mut stored = Vec::with_capacity(records.len());
        for record in &records {
            let row = bind_record(sqlx::query(&sql), &columns, record)
                .fetch_one(&mut **tx)
                .await?;
            stored.push(row_to_record(&row)?);
        }

        Ok(stored)
    }

    async fn update(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError> {
        let fields = T::fields();
        let key_field = fields.key_field();
        // creation stamps are written once, by insert
        let columns: Vec<&Field<T>> = fields
            .fields()
            .iter()
            .filter(|f| !f.is_key() && !is_creation_stamp(f))
            .collect();

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ${}", quote_identifier(f.column()), i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} AS t SET {} WHERE t.{} = $1 RETURNING to_jsonb(t.*) AS record",
            table::<T>(),
            assignments,
            quote_identifier(key_field.column())
        );

        let tx = self.open()?;
        let mut stored = Vec::with_capacity(records.len());
        for record in &records {
            let key = key_field.get(record);
            let query = bind_value(sqlx::query(&sql), &key, key_field.field_type());
            let row = bind_record(query, &columns, record)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| {
                    StoreError::not_found(format!(
                        "{} with key {}",
                        fields.record_name(),
                        key
                    ))
                })?;
            stored.push(row_to_record(&row)?);
        }

        Ok(stored)
    }

    async fn delete(&mut self, records: &[T]) -> Result<u64, StoreError> {
        let fields = T::fields();
        let key_field = fields.key_field();
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            table::<T>(),
            quote_identifier(key_field.column())
        );

        let tx = self.open()?;
        let mut deleted = 0;
        for record in records {
            let key = key_field.get(record);
            let result = bind_value(sqlx::query(&sql), &key, key_field.field_type())
                .execute(&mut **tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::not_found(format!(
                    "{} with key {}",
                    fields.record_name(),
                    key
                )));
            }
            deleted += result.rows_affected();
        }

        Ok(deleted)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
