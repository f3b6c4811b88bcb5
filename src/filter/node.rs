//! Filter tree over a record type
//!
//! A `Filter<T>` is an immutable predicate tree. Leaves are validated against
//! `T`'s accessor table when they are created, so an invalid tree can never be
//! applied or sent to a store.

use std::fmt;

use crate::error::{RepositoryError, Result};
use crate::filter::Operator;
use crate::record::{Field, Record, TENANT_COLUMN};
use crate::types::{json_kind, FieldValue};

/// A compiled, executable predicate
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A single `member <operator> literal` comparison
pub struct Leaf<T: 'static> {
    field: &'static Field<T>,
    operator: Operator,
    literal: FieldValue,
}

impl<T: 'static> Leaf<T> {
    pub fn field(&self) -> &'static Field<T> {
        self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn literal(&self) -> &FieldValue {
        &self.literal
    }

    pub fn matches(&self, record: &T) -> bool {
        self.operator.evaluate(&self.field.get(record), &self.literal)
    }
}

impl<T: 'static> Clone for Leaf<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            operator: self.operator,
            literal: self.literal.clone(),
        }
    }
}

/// Predicate tree over `T`
pub enum Filter<T: 'static> {
    /// Matches no record
    Nothing,
    Leaf(Leaf<T>),
    And(Box<Filter<T>>, Box<Filter<T>>),
    Or(Box<Filter<T>>, Box<Filter<T>>),
}

impl<T: Record> Filter<T> {
    /// Build a leaf from a property name, an operator and a JSON literal.
    ///
    /// Fails with `UnknownProperty` when `T` has no such member and with
    /// `TypeMismatch` when the literal cannot be converted to the member's
    /// type, or the operator does not apply to it.
    pub fn create(property: &str, operator: Operator, literal: &serde_json::Value) -> Result<Self> {
        let field = T::fields().resolve(property)?;
        let field_type = field.field_type();

        if operator.is_text() && !field_type.is_text() {
            return Err(RepositoryError::type_mismatch(
                property,
                format!("text member for {}", operator),
                field_type.name(),
            ));
        }

        let literal = field_type.coerce(literal).map_err(|_| {
            RepositoryError::type_mismatch(property, field_type.name(), json_kind(literal))
        })?;

        Self::checked_leaf(property, field, operator, literal)
    }

    /// Build a leaf from an already-typed value
    pub fn compare(property: &str, operator: Operator, value: impl Into<FieldValue>) -> Result<Self> {
        let field = T::fields().resolve(property)?;
        let value = value.into();
        let field_type = field.field_type();

        if operator.is_text() && !field_type.is_text() {
            return Err(RepositoryError::type_mismatch(
                property,
                format!("text member for {}", operator),
                field_type.name(),
            ));
        }
        if let Some(value_type) = value.field_type() {
            if value_type != field_type {
                return Err(RepositoryError::type_mismatch(
                    property,
                    field_type.name(),
                    value_type.name(),
                ));
            }
        }

        Self::checked_leaf(property, field, operator, value)
    }

    /// Leaf matching records owned by `tenant_id`
    pub fn tenant(tenant_id: i64) -> Result<Self> {
        Self::compare(TENANT_COLUMN, Operator::EqualTo, tenant_id)
    }

    fn checked_leaf(
        property: &str,
        field: &'static Field<T>,
        operator: Operator,
        literal: FieldValue,
    ) -> Result<Self> {
        if literal.is_null() && !(operator.accepts_null() && field.is_nullable()) {
            return Err(RepositoryError::type_mismatch(
                property,
                field.field_type().name(),
                "null",
            ));
        }

        Ok(Filter::Leaf(Leaf {
            field,
            operator,
            literal,
        }))
    }

    /// Fold the tree into a single predicate.
    pub fn compile(&self) -> Predicate<T> {
        match self {
            Filter::Nothing => Box::new(|_| false),
            Filter::Leaf(leaf) => {
                let leaf = leaf.clone();
                Box::new(move |record| leaf.matches(record))
            }
            Filter::And(lhs, rhs) => {
                let (lhs, rhs) = (lhs.compile(), rhs.compile());
                Box::new(move |record| lhs(record) && rhs(record))
            }
            Filter::Or(lhs, rhs) => {
                let (lhs, rhs) = (lhs.compile(), rhs.compile());
                Box::new(move |record| lhs(record) || rhs(record))
            }
        }
    }

    /// Filter a sequence in a single pass
    pub fn apply<I>(&self, items: I) -> impl Iterator<Item = T>
    where
        I: IntoIterator<Item = T>,
    {
        let predicate = self.compile();
        items.into_iter().filter(move |record| predicate(record))
    }
}

impl<T: 'static> Filter<T> {
    /// Filter that matches nothing
    pub fn nothing() -> Self {
        Filter::Nothing
    }

    pub fn and(self, other: Filter<T>) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter<T>) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Filter::Nothing)
    }

    /// Evaluate the tree against one record
    pub fn evaluate(&self, record: &T) -> bool {
        match self {
            Filter::Nothing => false,
            Filter::Leaf(leaf) => leaf.matches(record),
            Filter::And(lhs, rhs) => lhs.evaluate(record) && rhs.evaluate(record),
            Filter::Or(lhs, rhs) => lhs.evaluate(record) || rhs.evaluate(record),
        }
    }

    /// Number of leaves, `Nothing` included
    pub fn leaf_count(&self) -> usize {
        match self {
            Filter::Nothing | Filter::Leaf(_) => 1,
            Filter::And(lhs, rhs) | Filter::Or(lhs, rhs) => lhs.leaf_count() + rhs.leaf_count(),
        }
    }
}

impl<T: 'static> Clone for Filter<T> {
    fn clone(&self) -> Self {
        match self {
            Filter::Nothing => Filter::Nothing,
            Filter::Leaf(leaf) => Filter::Leaf(leaf.clone()),
            Filter::And(lhs, rhs) => Filter::And(lhs.clone(), rhs.clone()),
            Filter::Or(lhs, rhs) => Filter::Or(lhs.clone(), rhs.clone()),
        }
    }
}

impl<T: 'static> fmt::Display for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Nothing => f.write_str("NOTHING"),
            Filter::Leaf(leaf) => write!(
                f,
                "{} {} {}",
                leaf.field.name(),
                leaf.operator,
                leaf.literal
            ),
            Filter::And(lhs, rhs) => write!(f, "({} AND {})", lhs, rhs),
            Filter::Or(lhs, rhs) => write!(f, "({} OR {})", lhs, rhs),
        }
    }
}

impl<T: 'static> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AuditFields, FieldTable};
    use crate::types::FieldType;
    use serde_json::json;
    use std::sync::LazyLock;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: i64,
        name: String,
        age: i64,
        nickname: Option<String>,
        audit: AuditFields,
    }

    impl Record for Person {
        fn fields() -> &'static FieldTable<Self> {
            static FIELDS: LazyLock<FieldTable<Person>> = LazyLock::new(|| {
                FieldTable::builder("people")
                    .key("id", FieldType::Integer, |p: &Person| p.id.into())
                    .field("name", FieldType::Text, |p: &Person| p.name.as_str().into())
                    .field("age", FieldType::Integer, |p: &Person| p.age.into())
                    .nullable("nickname", FieldType::Text, |p: &Person| {
                        p.nickname.as_deref().into()
                    })
                    .with_audit()
                    .build()
                    .expect("person table")
            });
            &FIELDS
        }

        fn audit(&self) -> &AuditFields {
            &self.audit
        }

        fn audit_mut(&mut self) -> &mut AuditFields {
            &mut self.audit
        }
    }

    fn person(id: i64, name: &str, age: i64) -> Person {
        Person {
            id,
            name: name.to_string(),
            age,
            nickname: None,
            audit: AuditFields::default(),
        }
    }

    fn people() -> Vec<Person> {
        vec![
            person(1, "Bob", 25),
            person(2, "Carol", 35),
            person(3, "Dave", 40),
            person(4, "Alice", 20),
        ]
    }

    fn ids(records: impl Iterator<Item = Person>) -> Vec<i64> {
        records.map(|p| p.id).collect()
    }

    // =========================================================================
    // Leaf Creation Tests
    // =========================================================================

    #[test]
    fn test_create_resolves_property_case_insensitively() {
        let filter = Filter::<Person>::create("Age", Operator::GreaterThan, &json!(30)).unwrap();
        assert_eq!(ids(filter.apply(people())), vec![2, 3]);
    }

    #[test]
    fn test_create_unknown_property() {
        let err = Filter::<Person>::create("Height", Operator::EqualTo, &json!(1)).unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownProperty { .. }));
    }

    #[test]
    fn test_create_type_mismatch() {
        let err = Filter::<Person>::create("age", Operator::EqualTo, &json!("old")).unwrap_err();
        match err {
            RepositoryError::TypeMismatch {
                property,
                expected,
                found,
            } => {
                assert_eq!(property, "age");
                assert_eq!(expected, "integer");
                assert_eq!(found, "string");
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_text_operator_on_numeric_member_fails_at_creation() {
        let err = Filter::<Person>::create("age", Operator::Contains, &json!("3")).unwrap_err();
        assert!(matches!(err, RepositoryError::TypeMismatch { .. }));
    }

    #[test]
    fn test_null_literal_rules() {
        // nullable member with EqualTo null is fine
        let filter = Filter::<Person>::create("nickname", Operator::EqualTo, &json!(null)).unwrap();
        assert_eq!(ids(filter.apply(people())).len(), 4);

        // non-nullable member rejects null
        assert!(Filter::<Person>::create("age", Operator::EqualTo, &json!(null)).is_err());
        // ordering operators reject null
        assert!(Filter::<Person>::create("nickname", Operator::GreaterThan, &json!(null)).is_err());
    }

    #[test]
    fn test_compare_checks_value_type() {
        assert!(Filter::<Person>::compare("age", Operator::EqualTo, 25_i64).is_ok());
        assert!(matches!(
            Filter::<Person>::compare("age", Operator::EqualTo, "25"),
            Err(RepositoryError::TypeMismatch { .. })
        ));
    }

    // =========================================================================
    // Combinator Tests
    // =========================================================================

    #[test]
    fn test_or_adds_matches() {
        let older = Filter::<Person>::create("Age", Operator::GreaterThan, &json!(30)).unwrap();
        let a_names = Filter::<Person>::create("Name", Operator::StartsWith, &json!("A")).unwrap();

        assert_eq!(ids(older.or(a_names).apply(people())), vec![2, 3, 4]);
    }

    #[test]
    fn test_and_restricts_matches() {
        let older = Filter::<Person>::create("age", Operator::GreaterThan, &json!(30)).unwrap();
        let d_names = Filter::<Person>::create("name", Operator::StartsWith, &json!("D")).unwrap();

        assert_eq!(ids(older.and(d_names).apply(people())), vec![3]);
    }

    #[test]
    fn test_combinators_are_commutative_on_matched_set() {
        let a = Filter::<Person>::create("age", Operator::LessThan, &json!(36)).unwrap();
        let b = Filter::<Person>::create("name", Operator::Contains, &json!("o")).unwrap();

        assert_eq!(
            ids(a.clone().and(b.clone()).apply(people())),
            ids(b.clone().and(a.clone()).apply(people()))
        );
        assert_eq!(
            ids(a.clone().or(b.clone()).apply(people())),
            ids(b.or(a).apply(people()))
        );
    }

    #[test]
    fn test_combinators_are_associative_on_matched_set() {
        let a = Filter::<Person>::create("age", Operator::GreaterThan, &json!(22)).unwrap();
        let b = Filter::<Person>::create("name", Operator::Contains, &json!("a")).unwrap();
        let c = Filter::<Person>::create("id", Operator::LessThan, &json!(4)).unwrap();

        assert_eq!(
            ids(a.clone().and(b.clone()).and(c.clone()).apply(people())),
            ids(a.clone().and(b.clone().and(c.clone())).apply(people()))
        );
        assert_eq!(
            ids(a.clone().or(b.clone()).or(c.clone()).apply(people())),
            ids(a.or(b.or(c)).apply(people()))
        );
    }

    #[test]
    fn test_compiled_document_matches_hand_built_tree() {
        let document = json!({
            "logicalOperator": "Or",
            "lhs": {
                "logicalOperator": "And",
                "lhs": {"property": "age", "operation": "GreaterThan", "value": 22},
                "rhs": {"property": "name", "operation": "Contains", "value": "a"}
            },
            "rhs": {"property": "id", "operation": "EqualTo", "value": 1}
        });
        let compiled = crate::filter::FilterCompiler::default()
            .compile_value::<Person>(&document)
            .unwrap();

        let built = Filter::<Person>::create("age", Operator::GreaterThan, &json!(22))
            .unwrap()
            .and(Filter::create("name", Operator::Contains, &json!("a")).unwrap())
            .or(Filter::create("id", Operator::EqualTo, &json!(1)).unwrap());

        assert_eq!(compiled.to_string(), built.to_string());
        assert_eq!(ids(compiled.apply(people())), ids(built.apply(people())));
        assert_eq!(ids(built.apply(people())), vec![1, 2, 3]);
    }

    #[test]
    fn test_nothing_matches_nothing() {
        assert_eq!(Filter::<Person>::nothing().apply(people()).count(), 0);

        // Nothing is absorbing for And and neutral for Or
        let any = Filter::<Person>::create("age", Operator::GreaterThan, &json!(0)).unwrap();
        assert_eq!(any.clone().and(Filter::nothing()).apply(people()).count(), 0);
        assert_eq!(any.or(Filter::nothing()).apply(people()).count(), 4);
    }

    #[test]
    fn test_compile_agrees_with_evaluate() {
        let filter = Filter::<Person>::create("age", Operator::GreaterThanOrEqualTo, &json!(25))
            .unwrap()
            .and(Filter::create("name", Operator::EndsWith, &json!("e")).unwrap())
            .or(Filter::create("id", Operator::EqualTo, &json!(1)).unwrap());

        let predicate = filter.compile();
        for p in people() {
            assert_eq!(predicate(&p), filter.evaluate(&p));
        }
        assert_eq!(filter.leaf_count(), 3);
    }

    #[test]
    fn test_tenant_leaf() {
        let mut owned = person(9, "Eve", 50);
        owned.audit.tenant_id = 12;
        let filter = Filter::<Person>::tenant(12).unwrap();

        assert!(filter.evaluate(&owned));
        assert!(!filter.evaluate(&person(10, "Frank", 50)));
    }

    #[test]
    fn test_display() {
        let filter = Filter::<Person>::create("age", Operator::GreaterThan, &json!(30))
            .unwrap()
            .or(Filter::create("name", Operator::StartsWith, &json!("A")).unwrap());
        assert_eq!(
            filter.to_string(),
            "(age GreaterThan 30 OR name StartsWith 'A')"
        );
    }
}
