//! In-memory store session for testing and development
//!
//! Records are kept in insertion order behind an `RwLock`. A transaction works
//! on a private copy that replaces the shared state on commit, so a rollback
//! (or a dropped transaction) leaves nothing behind. Transactions on one
//! session are serialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::query::{QueryParameter, RecordQuery, TrackingMode, Window};
use crate::record::Record;
use crate::session::{StoreSession, StoreTransaction};
use crate::types::FieldValue;

/// In-memory store session
///
/// Cloning shares the underlying state.
pub struct InMemorySession<T> {
    records: Arc<RwLock<Vec<T>>>,
    tracked: Arc<RwLock<Vec<FieldValue>>>,
    gate: Arc<Mutex<()>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl<T> Clone for InMemorySession<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            tracked: Arc::clone(&self.tracked),
            gate: Arc::clone(&self.gate),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
        }
    }
}

impl<T: Record> Default for InMemorySession<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> InMemorySession<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Session pre-loaded with `records`
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            tracked: Arc::new(RwLock::new(Vec::new())),
            gate: Arc::new(Mutex::new(())),
            fail_next_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy of the committed state
    pub fn snapshot(&self) -> Vec<T> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries currently tracked
    pub fn tracked_count(&self) -> usize {
        self.tracked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Make the next `commit` fail, as a store outage would
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Result<Vec<T>, StoreError> {
        self.records
            .read()
            .map(|records| records.clone())
            .map_err(|e| StoreError::backend(format!("Failed to acquire read lock: {}", e)))
    }

    fn track(&self, records: &[T], mode: TrackingMode) -> Result<(), StoreError> {
        if mode == TrackingMode::Tracked {
            track(&self.tracked, records)?;
        }
        Ok(())
    }
}

fn track<T: Record>(tracked: &RwLock<Vec<FieldValue>>, records: &[T]) -> Result<(), StoreError> {
    let mut tracked = tracked
        .write()
        .map_err(|e| StoreError::backend(format!("Failed to acquire write lock: {}", e)))?;
    tracked.extend(records.iter().map(|r| r.key()));
    Ok(())
}

fn describe<T: Record>(key: &FieldValue) -> String {
    format!("{} with key {}", T::fields().record_name(), key)
}

#[async_trait]
impl<T: Record> StoreSession<T> for InMemorySession<T> {
    type Transaction = InMemoryTransaction<T>;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        let working = self.read()?;

        Ok(InMemoryTransaction {
            records: Arc::clone(&self.records),
            tracked: Arc::clone(&self.tracked),
            working,
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
            guard: Some(guard),
        })
    }

    async fn find(&self, key: &FieldValue, mode: TrackingMode) -> Result<Option<T>, StoreError> {
        let found = self.read()?.into_iter().find(|r| r.key() == *key);
        if let Some(record) = &found {
            self.track(std::slice::from_ref(record), mode)?;
        }
        Ok(found)
    }

    async fn fetch(
        &self,
        query: &RecordQuery<T>,
        window: Option<Window>,
        mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        let mut records = query.apply(self.read()?);
        if let Some(window) = window {
            records = window.slice(records);
        }
        self.track(&records, mode)?;
        Ok(records)
    }

    async fn count(&self, filter: &Filter<T>) -> Result<u64, StoreError> {
        let predicate = filter.compile();
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::backend(format!("Failed to acquire read lock: {}", e)))?;

        Ok(records.iter().filter(|r| predicate(r)).count() as u64)
    }

    async fn fetch_all(&self, mode: TrackingMode) -> Result<Vec<T>, StoreError> {
        let records = self.read()?;
        self.track(&records, mode)?;
        Ok(records)
    }

    async fn execute_procedure(
        &self,
        name: &str,
        _params: &[QueryParameter],
        _mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        Err(StoreError::unsupported(format!(
            "stored procedure '{}' cannot run against an in-memory session",
            name
        )))
    }

    async fn execute_raw(
        &self,
        _query: &str,
        _params: &[QueryParameter],
        _mode: TrackingMode,
    ) -> Result<Vec<T>, StoreError> {
        Err(StoreError::unsupported(
            "raw queries cannot run against an in-memory session",
        ))
    }

    fn detach_all(&self) {
        self.tracked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Transaction over an [`InMemorySession`]
pub struct InMemoryTransaction<T> {
    records: Arc<RwLock<Vec<T>>>,
    tracked: Arc<RwLock<Vec<FieldValue>>>,
    working: Vec<T>,
    fail_commit: bool,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<T: Record> InMemoryTransaction<T> {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }

    fn position(&self, key: &FieldValue) -> Option<usize> {
        self.working.iter().position(|r| r.key() == *key)
    }
}

#[async_trait]
impl<T: Record> StoreTransaction<T> for InMemoryTransaction<T> {
    async fn insert(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError> {
        self.ensure_open()?;

        for record in &records {
            let key = record.key();
            if self.position(&key).is_some() {
                return Err(StoreError::conflict(format!(
                    "{} already exists",
                    describe::<T>(&key)
                )));
            }
            self.working.push(record.clone());
        }

        track(&self.tracked, &records)?;
        Ok(records)
    }

    async fn update(&mut self, records: Vec<T>) -> Result<Vec<T>, StoreError> {
        self.ensure_open()?;

        let mut stored = Vec::with_capacity(records.len());
        for mut record in records {
            let key = record.key();
            let index = self
                .position(&key)
                .ok_or_else(|| StoreError::not_found(describe::<T>(&key)))?;

            // creation stamps are written once, by insert
            let existing = *self.working[index].audit();
            let audit = record.audit_mut();
            audit.created_by = existing.created_by;
            audit.created_at = existing.created_at;

            self.working[index] = record.clone();
            stored.push(record);
        }

        track(&self.tracked, &stored)?;
        Ok(stored)
    }

    async fn delete(&mut self, records: &[T]) -> Result<u64, StoreError> {
        self.ensure_open()?;

        for record in records {
            let key = record.key();
            let index = self
                .position(&key)
                .ok_or_else(|| StoreError::not_found(describe::<T>(&key)))?;
            self.working.remove(index);
        }

        Ok(records.len() as u64)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;

        if self.fail_commit {
            self.fail_commit = false;
            return Err(StoreError::backend("commit rejected by the store"));
        }

        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::backend(format!("Failed to acquire write lock: {}", e)))?;
        *records = std::mem::take(&mut self.working);
        drop(records);

        self.guard = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.working.clear();
        self.guard = None;
        Ok(())
    }
}
