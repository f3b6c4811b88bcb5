//! SQL generation for the Postgres session
//!
//! Identifier sanitization and filter/order pushdown.

pub mod condition;
pub mod sanitize;

pub use condition::{build_filter_clause, build_order_by_clause, escape_like};
pub use sanitize::{
    POSTGRES_RESERVED_WORDS, quote_identifier, quote_qualified, validate_identifier,
    validate_procedure_name,
};
