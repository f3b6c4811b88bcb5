//! JSON filter DSL compiler
//!
//! A document is either a leaf
//!
//! ```json
//! { "property": "Age", "operation": "GreaterThan", "value": 30 }
//! ```
//!
//! or a binary combinator
//!
//! ```json
//! { "logicalOperator": "Or", "lhs": { ... }, "rhs": { ... } }
//! ```
//!
//! Keys and operator names are matched case-insensitively. An absent or empty
//! document compiles to [`Filter::Nothing`].

use serde_json::{Map, Value};

use crate::config::DEFAULT_MAX_FILTER_DEPTH;
use crate::error::{RepositoryError, Result};
use crate::filter::{Filter, LogicalOperator, Operator};
use crate::record::Record;
use crate::types::json_kind;

const PROPERTY_KEYS: &[&str] = &["property"];
const OPERATION_KEYS: &[&str] = &["operation", "operator"];
const VALUE_KEYS: &[&str] = &["value"];
const LOGICAL_KEYS: &[&str] = &["logicalOperator"];
const LHS_KEYS: &[&str] = &["lhs"];
const RHS_KEYS: &[&str] = &["rhs"];

/// Recursive-descent compiler from the JSON DSL to a [`Filter`] tree
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler {
    max_depth: usize,
}

impl Default for FilterCompiler {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_FILTER_DEPTH,
        }
    }
}

impl FilterCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject documents nested deeper than `max_depth`
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compile a JSON document given as text
    pub fn compile_str<T: Record>(&self, text: &str) -> Result<Filter<T>> {
        if text.trim().is_empty() {
            return Ok(Filter::Nothing);
        }

        let document: Value = serde_json::from_str(text)
            .map_err(|e| RepositoryError::malformed(format!("invalid JSON: {}", e)))?;

        self.compile_value(&document)
    }

    /// Compile an already-parsed JSON document
    pub fn compile_value<T: Record>(&self, document: &Value) -> Result<Filter<T>> {
        self.build(document, 0)
    }

    fn build<T: Record>(&self, node: &Value, depth: usize) -> Result<Filter<T>> {
        if depth > self.max_depth {
            return Err(RepositoryError::malformed(format!(
                "filter nesting exceeds maximum depth of {}",
                self.max_depth
            )));
        }

        let object = match node {
            Value::Null => return Ok(Filter::Nothing),
            Value::Object(object) => object,
            other => {
                return Err(RepositoryError::malformed(format!(
                    "expected a filter object, got {}",
                    json_kind(other)
                )));
            }
        };

        if let Some(property) = lookup(object, PROPERTY_KEYS) {
            return self.build_leaf(object, property);
        }

        if let Some(logical) = lookup(object, LOGICAL_KEYS) {
            let logical: LogicalOperator = expect_str(logical, "logicalOperator")?.parse()?;

            let lhs = lookup(object, LHS_KEYS)
                .ok_or_else(|| RepositoryError::malformed("combinator is missing 'lhs'"))?;
            let rhs = lookup(object, RHS_KEYS)
                .ok_or_else(|| RepositoryError::malformed("combinator is missing 'rhs'"))?;

            let lhs = self.build::<T>(lhs, depth + 1)?;
            let rhs = self.build::<T>(rhs, depth + 1)?;

            return Ok(match logical {
                LogicalOperator::And => lhs.and(rhs),
                LogicalOperator::Or => lhs.or(rhs),
            });
        }

        Ok(Filter::Nothing)
    }

    fn build_leaf<T: Record>(&self, object: &Map<String, Value>, property: &Value) -> Result<Filter<T>> {
        let property = expect_str(property, "property")?;

        let operation = lookup(object, OPERATION_KEYS).ok_or_else(|| {
            RepositoryError::malformed(format!("leaf on '{}' is missing 'operation'", property))
        })?;
        let operator: Operator = expect_str(operation, "operation")?.parse()?;

        let value = lookup(object, VALUE_KEYS).unwrap_or(&Value::Null);

        Filter::create(property, operator, value)
    }
}

/// Case-insensitive key lookup
fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    object.iter().find_map(|(k, v)| {
        keys.iter()
            .any(|key| k.eq_ignore_ascii_case(key))
            .then_some(v)
    })
}

fn expect_str<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        RepositoryError::malformed(format!(
            "'{}' must be a string, got {}",
            key,
            json_kind(value)
        ))
    })
}
