//! Filter and order pushdown to SQL
//!
//! Converts a [`Filter`] tree into a parameterized `WHERE` clause and a
//! [`DynamicOrder`] into an `ORDER BY` list. Literals are never inlined; every
//! value is bound to a `$n` placeholder. Column names come from the record's
//! field table and are always quoted.

use crate::filter::{Filter, Leaf, Operator};
use crate::order::{DynamicOrder, SortDirection};
use crate::record::Record;
use crate::sql::sanitize::quote_identifier;
use crate::types::{FieldType, FieldValue};

/// Build a SQL WHERE clause from a filter tree
///
/// Returns `(clause, params)` where `clause` uses placeholders starting at
/// `param_offset` and `params` holds the values to bind, in order. The offset
/// is advanced past the placeholders used.
///
/// `Nothing` renders as `FALSE`. Text operators render as
/// `LIKE $n ESCAPE '\'` with `%`, `_` and `\` in the literal escaped, so
/// matching is case-sensitive as it is in memory. Ordering comparisons on
/// text columns use `COLLATE "C"`.
pub fn build_filter_clause<T: 'static>(
    filter: &Filter<T>,
    param_offset: &mut i32,
) -> (String, Vec<FieldValue>) {
    let mut params = Vec::new();
    let clause = render(filter, param_offset, &mut params);
    (clause, params)
}

fn render<T: 'static>(
    filter: &Filter<T>,
    param_offset: &mut i32,
    params: &mut Vec<FieldValue>,
) -> String {
    match filter {
        Filter::Nothing => "FALSE".to_string(),
        Filter::Leaf(leaf) => render_leaf(leaf, param_offset, params),
        Filter::And(lhs, rhs) => {
            let lhs = render(lhs, param_offset, params);
            let rhs = render(rhs, param_offset, params);
            format!("({} AND {})", lhs, rhs)
        }
        Filter::Or(lhs, rhs) => {
            let lhs = render(lhs, param_offset, params);
            let rhs = render(rhs, param_offset, params);
            format!("({} OR {})", lhs, rhs)
        }
    }
}

fn render_leaf<T: 'static>(
    leaf: &Leaf<T>,
    param_offset: &mut i32,
    params: &mut Vec<FieldValue>,
) -> String {
    let column = quote_identifier(leaf.field().column());
    let literal = leaf.literal();

    // Leaf construction only admits null with EqualTo / NotEqualTo
    if literal.is_null() {
        return match leaf.operator() {
            Operator::NotEqualTo => format!("{} IS NOT NULL", column),
            _ => format!("{} IS NULL", column),
        };
    }

    let (operator, value) = match leaf.operator() {
        Operator::EqualTo => ("=", literal.clone()),
        Operator::NotEqualTo => ("<>", literal.clone()),
        Operator::GreaterThan => (">", literal.clone()),
        Operator::GreaterThanOrEqualTo => (">=", literal.clone()),
        Operator::LessThan => ("<", literal.clone()),
        Operator::LessThanOrEqualTo => ("<=", literal.clone()),
        Operator::Contains => ("LIKE", like_pattern(literal, "%", "%")),
        Operator::StartsWith => ("LIKE", like_pattern(literal, "", "%")),
        Operator::EndsWith => ("LIKE", like_pattern(literal, "%", "")),
    };

    let placeholder = *param_offset;
    *param_offset += 1;
    params.push(value);

    let column = if leaf.operator().is_ordering() {
        byte_ordered(column, leaf.field().field_type())
    } else {
        column
    };

    let escape = if leaf.operator().is_text() {
        " ESCAPE '\\'"
    } else {
        ""
    };
    format!("{} {} ${}{}", column, operator, placeholder, escape)
}

/// Text compares by byte order, matching the in-memory session
fn byte_ordered(column: String, field_type: FieldType) -> String {
    if field_type.is_text() {
        format!("{} COLLATE \"C\"", column)
    } else {
        column
    }
}

fn like_pattern(literal: &FieldValue, prefix: &str, suffix: &str) -> FieldValue {
    let text = literal.as_text().unwrap_or_default();
    FieldValue::Text(format!("{}{}{}", prefix, escape_like(text), suffix))
}

/// Escape LIKE wildcards so the literal matches verbatim
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the ORDER BY list
///
/// Without an order the key column is used, so paging is deterministic.
/// Nulls sort first ascending and last descending.
pub fn build_order_by_clause<T: Record>(order: Option<&DynamicOrder<T>>) -> String {
    let Some(order) = order.filter(|o| !o.keys().is_empty()) else {
        return format!("{} ASC", quote_identifier(T::fields().key_field().column()));
    };

    order
        .keys()
        .iter()
        .map(|key| {
            let nulls = match key.direction() {
                SortDirection::Ascending => "NULLS FIRST",
                SortDirection::Descending => "NULLS LAST",
            };
            format!(
                "{} {} {}",
                byte_ordered(
                    quote_identifier(key.field().column()),
                    key.field().field_type()
                ),
                key.direction().as_sql(),
                nulls
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
