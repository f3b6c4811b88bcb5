//! Dynamic ordering by property name
//!
//! A [`DynamicOrder`] resolves its members once, when it is built, and then
//! sorts with the members' natural order. Nulls sort first ascending and last
//! descending; the SQL pushdown emits `NULLS FIRST` / `NULLS LAST` to match.
//! Text sorts by byte order, pushed down as `COLLATE "C"`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::record::{Field, Record};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(RepositoryError::unsupported_operator(format!(
                "'{}' is not a sort direction",
                s
            ))),
        }
    }
}

impl TryFrom<String> for SortDirection {
    type Error = RepositoryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Order request as received from a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderRequest {
    pub fn new(property: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// One resolved sort key
pub struct OrderKey<T: 'static> {
    field: &'static Field<T>,
    direction: SortDirection,
}

impl<T: 'static> OrderKey<T> {
    pub fn field(&self) -> &'static Field<T> {
        self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        let ordering = self.field.get(a).sort_cmp(&self.field.get(b));
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl<T: 'static> Clone for OrderKey<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            direction: self.direction,
        }
    }
}

/// Ordering over `T` built from property names
pub struct DynamicOrder<T: 'static> {
    keys: Vec<OrderKey<T>>,
}

impl<T: Record> DynamicOrder<T> {
    pub fn ascending(property: &str) -> Result<Self> {
        Self::by(property, SortDirection::Ascending)
    }

    pub fn descending(property: &str) -> Result<Self> {
        Self::by(property, SortDirection::Descending)
    }

    /// Resolve `property` on `T`; fails with `UnknownProperty`
    pub fn by(property: &str, direction: SortDirection) -> Result<Self> {
        Ok(Self {
            keys: vec![Self::key(property, direction)?],
        })
    }

    pub fn from_request(request: &OrderRequest) -> Result<Self> {
        Self::by(&request.property, request.direction)
    }

    /// Add a secondary ascending key
    pub fn then_ascending(self, property: &str) -> Result<Self> {
        self.then(property, SortDirection::Ascending)
    }

    /// Add a secondary descending key
    pub fn then_descending(self, property: &str) -> Result<Self> {
        self.then(property, SortDirection::Descending)
    }

    fn then(mut self, property: &str, direction: SortDirection) -> Result<Self> {
        self.keys.push(Self::key(property, direction)?);
        Ok(self)
    }

    fn key(property: &str, direction: SortDirection) -> Result<OrderKey<T>> {
        Ok(OrderKey {
            field: T::fields().resolve(property)?,
            direction,
        })
    }
}

impl<T: 'static> DynamicOrder<T> {
    pub fn keys(&self) -> &[OrderKey<T>] {
        &self.keys
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.keys
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable sort in place
    pub fn sort(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }

    pub fn apply(&self, mut items: Vec<T>) -> Vec<T> {
        self.sort(&mut items);
        items
    }
}

impl<T: 'static> Clone for DynamicOrder<T> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for DynamicOrder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{} {}", k.field.name(), k.direction.as_sql()))
            .collect();
        write!(f, "DynamicOrder({})", keys.join(", "))
    }
}
