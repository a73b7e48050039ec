//! Typed attribute predicates for hybrid search.
//!
//! A [`Predicate`] is a small expression tree over attribute name, comparison
//! operator and literal. It replaces free-form filter strings such as
//! `"score > 50"` with `Predicate::gt("score", 50)`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::vector::{AttributeValue, Attributes};

/// Comparison operator for a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Boolean expression over a record's attributes.
///
/// Comparisons against a missing attribute, or between incomparable types
/// (text against a number), evaluate to `false`.
///
/// Deserializes from JSON such as
/// `{"and": [{"compare": {"field": "score", "op": "gt", "value": 50}},
/// {"in": {"field": "lang", "values": ["en", "ja"]}}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: AttributeValue,
    },
    In {
        field: String,
        values: Vec<AttributeValue>,
    },
    Exists {
        field: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare<F, V>(field: F, op: CompareOp, value: V) -> Self
    where
        F: Into<String>,
        V: Into<AttributeValue>,
    {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equals<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn not_equals<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    pub fn lt<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte<F: Into<String>, V: Into<AttributeValue>>(field: F, value: V) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    pub fn one_of<F, I, V>(field: F, values: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists<F: Into<String>>(field: F) -> Self {
        Predicate::Exists {
            field: field.into(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut clauses) => {
                clauses.push(other);
                Predicate::And(clauses)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut clauses) => {
                clauses.push(other);
                Predicate::Or(clauses)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluate against a record's attributes.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            Predicate::Compare { field, op, value } => attributes
                .get(field)
                .and_then(|actual| actual.compare(value))
                .is_some_and(|ordering| op.accepts(ordering)),
            Predicate::In { field, values } => attributes.get(field).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| actual.compare(v) == Some(Ordering::Equal))
            }),
            Predicate::Exists { field } => attributes.contains_key(field),
            Predicate::And(clauses) => clauses.iter().all(|p| p.matches(attributes)),
            Predicate::Or(clauses) => clauses.iter().any(|p| p.matches(attributes)),
            Predicate::Not(inner) => !inner.matches(attributes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: Vec<(&str, AttributeValue)>) -> Attributes {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_gt_keeps_only_passing_scores() {
        let filter = Predicate::gt("score", 50);
        let kept: Vec<i64> = [10, 60, 80]
            .into_iter()
            .filter(|score| filter.matches(&attrs(vec![("score", (*score).into())])))
            .collect();
        assert_eq!(kept, vec![60, 80]);
    }

    #[test]
    fn test_numeric_comparison_across_int_and_float() {
        let a = attrs(vec![("score", AttributeValue::Float(50.5))]);
        assert!(Predicate::gt("score", 50).matches(&a));
        assert!(Predicate::lte("score", 50.5).matches(&a));
        assert!(!Predicate::equals("score", 50).matches(&a));
    }

    #[test]
    fn test_missing_and_incomparable_are_false() {
        let a = attrs(vec![("lang", "en".into())]);
        assert!(!Predicate::gt("score", 1).matches(&a));
        assert!(!Predicate::not_equals("score", 1).matches(&a));
        assert!(!Predicate::gt("lang", 1).matches(&a));
        assert!(Predicate::gt("score", 1).negate().matches(&a));
    }

    #[test]
    fn test_boolean_combinators() {
        let a = attrs(vec![("score", 70.into()), ("lang", "ja".into())]);
        let filter = Predicate::gt("score", 50).and(Predicate::one_of("lang", ["en", "ja"]));
        assert!(filter.matches(&a));

        let filter = Predicate::lt("score", 10).or(Predicate::equals("lang", "ja"));
        assert!(filter.matches(&a));

        assert!(Predicate::exists("lang").matches(&a));
        assert!(!Predicate::exists("title").matches(&a));
        assert!(Predicate::And(vec![]).matches(&a));
        assert!(!Predicate::Or(vec![]).matches(&a));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{"and": [
            {"compare": {"field": "score", "op": "gt", "value": 50}},
            {"in": {"field": "lang", "values": ["en", "ja"]}}
        ]}"#;
        let filter: Predicate = serde_json::from_str(json).unwrap();
        assert_eq!(
            filter,
            Predicate::gt("score", 50).and(Predicate::one_of("lang", ["en", "ja"]))
        );
    }
}
