//! Query, pagination and raw-call parameter types

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};
use crate::filter::Filter;
use crate::order::DynamicOrder;
use crate::record::Record;
use crate::types::{FieldType, FieldValue};

/// Whether fetched records stay attached to the session's tracking set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackingMode {
    Tracked,
    #[default]
    Untracked,
}

/// A filter plus an optional order, applied filter first
pub struct RecordQuery<T: 'static> {
    pub filter: Filter<T>,
    pub order: Option<DynamicOrder<T>>,
}

impl<T: Record> RecordQuery<T> {
    pub fn new(filter: Filter<T>) -> Self {
        Self {
            filter,
            order: None,
        }
    }

    pub fn order_by(mut self, order: DynamicOrder<T>) -> Self {
        self.order = Some(order);
        self
    }

    /// Filter then sort in memory, scanning the input once
    pub fn apply<I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let matched: Vec<T> = self.filter.apply(items).collect();
        match &self.order {
            Some(order) => order.apply(matched),
            None => matched,
        }
    }
}

impl<T: Record> From<Filter<T>> for RecordQuery<T> {
    fn from(filter: Filter<T>) -> Self {
        Self::new(filter)
    }
}

impl<T: 'static> Clone for RecordQuery<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order: self.order.clone(),
        }
    }
}

impl<T: 'static> std::fmt::Debug for RecordQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordQuery")
            .field("filter", &self.filter)
            .field("order", &self.order)
            .finish()
    }
}

/// Offset/limit window handed to a store session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    /// Slice an already-filtered, already-ordered sequence
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

/// Page request (`pageIndex` is 0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_index: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    /// Check the size against `max_page_size` and compute the window
    pub fn validate(&self, max_page_size: u32) -> Result<Window> {
        if self.page_size == 0 || self.page_size > max_page_size {
            return Err(RepositoryError::InvalidPageSize(self.page_size));
        }

        Ok(Window {
            offset: u64::from(self.page_index) * u64::from(self.page_size),
            limit: u64::from(self.page_size),
        })
    }
}

/// One page of results together with the size of the filtered set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total_count: u64,
}

impl<T> Paginated<T> {
    /// Project every item, keeping the total
    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Named parameter for raw and procedure calls.
///
/// `field_type` is the SQL type a null value is bound with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: FieldValue,
    pub field_type: FieldType,
}

impl QueryParameter {
    /// Parameter typed after its value; a bare null is bound as text
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        let field_type = value.field_type().unwrap_or(FieldType::Text);
        Self {
            name: name.into(),
            value,
            field_type,
        }
    }

    /// Parameter with an explicit type, for values that may be null
    pub fn typed(
        name: impl Into<String>,
        field_type: FieldType,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            field_type,
        }
    }
}
