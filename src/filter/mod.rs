//! Dynamic filtering
//!
//! Filters arrive as data (a small JSON DSL), are compiled by
//! [`FilterCompiler`] into a [`Filter`] tree over a record type, and are then
//! either folded into one in-memory predicate or pushed down to SQL by
//! [`build_filter_clause`](crate::sql::condition::build_filter_clause).

pub mod compiler;
pub mod node;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RepositoryError;
use crate::types::FieldValue;

pub use compiler::FilterCompiler;
pub use node::{Filter, Leaf, Predicate};

/// Comparison operators supported in filter leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::EqualTo,
        Operator::NotEqualTo,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqualTo,
        Operator::LessThan,
        Operator::LessThanOrEqualTo,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operator::EqualTo => "EqualTo",
            Operator::NotEqualTo => "NotEqualTo",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanOrEqualTo => "GreaterThanOrEqualTo",
            Operator::LessThan => "LessThan",
            Operator::LessThanOrEqualTo => "LessThanOrEqualTo",
            Operator::Contains => "Contains",
            Operator::StartsWith => "StartsWith",
            Operator::EndsWith => "EndsWith",
        }
    }

    /// Operators that only apply to text members
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    /// `>`, `>=`, `<` and `<=`
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqualTo
                | Operator::LessThan
                | Operator::LessThanOrEqualTo
        )
    }

    /// Operators that accept a `null` literal
    pub fn accepts_null(&self) -> bool {
        matches!(self, Operator::EqualTo | Operator::NotEqualTo)
    }

    /// Evaluate `member <op> literal`.
    ///
    /// A null member never satisfies an ordering or text operator. Text
    /// matching is case-sensitive.
    pub fn evaluate(&self, member: &FieldValue, literal: &FieldValue) -> bool {
        if literal.is_null() {
            return match self {
                Operator::EqualTo => member.is_null(),
                Operator::NotEqualTo => !member.is_null(),
                _ => false,
            };
        }

        match self {
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                let (Some(member), Some(needle)) = (member.as_text(), literal.as_text()) else {
                    return false;
                };
                match self {
                    Operator::Contains => member.contains(needle),
                    Operator::StartsWith => member.starts_with(needle),
                    _ => member.ends_with(needle),
                }
            }
            _ => {
                let Some(ordering) = member.compare(literal) else {
                    return false;
                };
                match self {
                    Operator::EqualTo => ordering == Ordering::Equal,
                    Operator::NotEqualTo => ordering != Ordering::Equal,
                    Operator::GreaterThan => ordering == Ordering::Greater,
                    Operator::GreaterThanOrEqualTo => ordering != Ordering::Less,
                    Operator::LessThan => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = RepositoryError;

    /// Case-insensitive; also accepts the short `GreaterThanEqualTo` /
    /// `LessThanEqualTo` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "equalto" | "equals" | "eq" => Ok(Operator::EqualTo),
            "notequalto" | "notequals" | "ne" => Ok(Operator::NotEqualTo),
            "greaterthan" | "gt" => Ok(Operator::GreaterThan),
            "greaterthanorequalto" | "greaterthanequalto" | "gte" => {
                Ok(Operator::GreaterThanOrEqualTo)
            }
            "lessthan" | "lt" => Ok(Operator::LessThan),
            "lessthanorequalto" | "lessthanequalto" | "lte" => Ok(Operator::LessThanOrEqualTo),
            "contains" => Ok(Operator::Contains),
            "startswith" => Ok(Operator::StartsWith),
            "endswith" => Ok(Operator::EndsWith),
            _ => Err(RepositoryError::unsupported_operator(format!(
                "'{}' is not a comparison operator",
                s
            ))),
        }
    }
}

/// Boolean combinators joining two filter sub-trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicalOperator {
    And,
    Or,
}

impl FromStr for LogicalOperator {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(LogicalOperator::And),
            "or" => Ok(LogicalOperator::Or),
            _ => Err(RepositoryError::unsupported_operator(format!(
                "'{}' is not a logical operator",
                s
            ))),
        }
    }
}
