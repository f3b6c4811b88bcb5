//! Record types and their member accessor tables
//!
//! A record type describes its members once, in a [`FieldTable`], mapping each
//! property name to a typed getter. The filter compiler and the order builder
//! resolve property names against this table instead of inspecting the type at
//! runtime.
//!
//! ```rust
//! use std::sync::LazyLock;
//! use serde::{Deserialize, Serialize};
//! use tenant_repository::{AuditFields, FieldTable, FieldType, Record};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i64,
//!     #[serde(flatten)]
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
//! assert!(Person::fields().get("Age").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::types::{FieldType, FieldValue};

pub const CREATED_BY_COLUMN: &str = "created_by";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_BY_COLUMN: &str = "updated_by";
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const TENANT_COLUMN: &str = "tenant_id";

/// A persisted record type
pub trait Record: Clone + Send + Sync + 'static {
    /// Member accessor table, built once per type
    fn fields() -> &'static FieldTable<Self>;

    fn audit(&self) -> &AuditFields;

    fn audit_mut(&mut self) -> &mut AuditFields;

    /// Value of the key member
    fn key(&self) -> FieldValue {
        Self::fields().key_field().get(self)
    }
}

// ============================================================================
// Audit and tenant members
// ============================================================================

/// Audit and owning-tenant members carried by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
    pub tenant_id: i64,
}

impl Default for AuditFields {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_by: 0,
            created_at: now,
            updated_by: 0,
            updated_at: now,
            tenant_id: 0,
        }
    }
}

impl AuditFields {
    /// Stamp for a record about to be created
    pub fn stamp_created(&mut self, tenant_id: i64, user_id: i64, now: DateTime<Utc>) {
        self.created_by = user_id;
        self.created_at = now;
        self.stamp_updated(tenant_id, user_id, now);
    }

    /// Stamp for any write
    pub fn stamp_updated(&mut self, tenant_id: i64, user_id: i64, now: DateTime<Utc>) {
        self.tenant_id = tenant_id;
        self.updated_by = user_id;
        self.updated_at = now;
    }
}

// ============================================================================
// Member accessors
// ============================================================================

/// A single readable member of `T`
pub struct Field<T> {
    name: &'static str,
    column: &'static str,
    field_type: FieldType,
    nullable: bool,
    key: bool,
    getter: fn(&T) -> FieldValue,
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Storage column backing this member
    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    /// Read this member from a record
    pub fn get(&self, record: &T) -> FieldValue {
        (self.getter)(record)
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("key", &self.key)
            .finish()
    }
}

/// Property lookups ignore case and underscores, so `CreatedBy`,
/// `createdBy` and `created_by` name the same member.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name-to-accessor mapping for one record type
pub struct FieldTable<T> {
    record: &'static str,
    table: &'static str,
    fields: Vec<Field<T>>,
    index: HashMap<String, usize>,
    key: usize,
}

impl<T> FieldTable<T> {
    pub fn builder(table: &'static str) -> FieldTableBuilder<T> {
        FieldTableBuilder::new(table)
    }

    /// Short type name of the record, used in error messages
    pub fn record_name(&self) -> &'static str {
        self.record
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn key_field(&self) -> &Field<T> {
        &self.fields[self.key]
    }

    pub fn get(&self, name: &str) -> Option<&Field<T>> {
        self.index.get(&normalize(name)).map(|&i| &self.fields[i])
    }

    /// Resolve a property name, failing with `UnknownProperty`
    pub fn resolve(&self, name: &str) -> Result<&Field<T>> {
        self.get(name)
            .ok_or_else(|| RepositoryError::unknown_property(name, self.record))
    }

    /// All member values of a record, in declaration order
    pub fn values(&self, record: &T) -> Vec<(&Field<T>, FieldValue)> {
        self.fields.iter().map(|f| (f, f.get(record))).collect()
    }
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTable")
            .field("record", &self.record)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder for FieldTable
pub struct FieldTableBuilder<T> {
    table: &'static str,
    fields: Vec<Field<T>>,
}

impl<T> FieldTableBuilder<T> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            fields: Vec::new(),
        }
    }

    fn push(
        mut self,
        name: &'static str,
        field_type: FieldType,
        nullable: bool,
        key: bool,
        getter: fn(&T) -> FieldValue,
    ) -> Self {
        self.fields.push(Field {
            name,
            column: name,
            field_type,
            nullable,
            key,
            getter,
        });
        self
    }

    /// Register the key member
    pub fn key(self, name: &'static str, field_type: FieldType, getter: fn(&T) -> FieldValue) -> Self {
        self.push(name, field_type, false, true, getter)
    }

    /// Register a non-nullable member
    pub fn field(
        self,
        name: &'static str,
        field_type: FieldType,
        getter: fn(&T) -> FieldValue,
    ) -> Self {
        self.push(name, field_type, false, false, getter)
    }

    /// Register a nullable member
    pub fn nullable(
        self,
        name: &'static str,
        field_type: FieldType,
        getter: fn(&T) -> FieldValue,
    ) -> Self {
        self.push(name, field_type, true, false, getter)
    }

    /// Map the most recently registered member to a different storage column
    pub fn column(mut self, column: &'static str) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.column = column;
        }
        self
    }

    /// Build the table.
    ///
    /// Fails when no key is registered, more than one is, or two members
    /// collide after name normalization.
    pub fn build(self) -> Result<FieldTable<T>> {
        let record = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("record");

        let mut index = HashMap::new();
        let mut key = None;

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() || field.column.is_empty() {
                return Err(RepositoryError::InvalidIdentifier(format!(
                    "empty member name on record '{}'",
                    record
                )));
            }
            if index.insert(normalize(field.name), i).is_some() {
                return Err(RepositoryError::InvalidIdentifier(format!(
                    "member '{}' is declared twice on record '{}'",
                    field.name, record
                )));
            }
            if field.key {
                if key.is_some() {
                    return Err(RepositoryError::InvalidIdentifier(format!(
                        "record '{}' declares more than one key",
                        record
                    )));
                }
                key = Some(i);
            }
        }

        let key = key.ok_or_else(|| {
            RepositoryError::InvalidIdentifier(format!("record '{}' declares no key", record))
        })?;

        Ok(FieldTable {
            record,
            table: self.table,
            fields: self.fields,
            index,
            key,
        })
    }
}

impl<T: Record> FieldTableBuilder<T> {
    /// Register the audit and tenant members read through [`Record::audit`]
    pub fn with_audit(self) -> Self {
        self.field(CREATED_BY_COLUMN, FieldType::Integer, |r: &T| {
            r.audit().created_by.into()
        })
        .field(CREATED_AT_COLUMN, FieldType::Timestamp, |r: &T| {
            r.audit().created_at.into()
        })
        .field(UPDATED_BY_COLUMN, FieldType::Integer, |r: &T| {
            r.audit().updated_by.into()
        })
        .field(UPDATED_AT_COLUMN, FieldType::Timestamp, |r: &T| {
            r.audit().updated_at.into()
        })
        .field(TENANT_COLUMN, FieldType::Integer, |r: &T| {
            r.audit().tenant_id.into()
        })
    }
}
