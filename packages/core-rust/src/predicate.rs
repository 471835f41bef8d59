//! Generic predicate trees and their in-memory evaluation.
//!
//! A [`Predicate`] is built by the caller for one query and handed to the
//! [`FilterTranslator`](crate::filter::FilterTranslator). When the translator
//! cannot express it natively, the caller fetches broadly and keeps only the
//! decoded entities for which [`Predicate::matches`] holds.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{Entity, Value};

/// Comparison operators of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

/// Leaf comparison of one attribute against one or more values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub op: CompareOp,
    pub values: Vec<Value>,
    #[serde(default)]
    pub negated: bool,
}

/// Recursive predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Builds a non-negated leaf with a single value.
    #[must_use]
    pub fn compare(attribute: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self::Compare(Condition {
            attribute: attribute.into(),
            op,
            values: vec![value],
            negated: false,
        })
    }

    /// Shorthand for an `Equals` leaf on a text value.
    #[must_use]
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(attribute, CompareOp::Equals, Value::Text(value.into()))
    }

    /// Shorthand for a `Contains` leaf on a text value.
    #[must_use]
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(attribute, CompareOp::Contains, Value::Text(value.into()))
    }

    /// Logical negation. Leaves flip their `negated` flag; boolean nodes are
    /// rewritten with De Morgan's laws.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Compare(mut c) => {
                c.negated = !c.negated;
                Self::Compare(c)
            }
            Self::And(children) => Self::Or(children.into_iter().map(Self::negate).collect()),
            Self::Or(children) => Self::And(children.into_iter().map(Self::negate).collect()),
        }
    }

    /// Evaluates the predicate against a decoded entity.
    ///
    /// `identity_attribute` resolves to the entity's identifier. A leaf holds
    /// when any entity value satisfies the operator against any leaf value.
    #[must_use]
    pub fn matches(&self, entity: &Entity, identity_attribute: &str) -> bool {
        match self {
            Self::Compare(c) => c.matches(entity, identity_attribute),
            Self::And(children) => children.iter().all(|p| p.matches(entity, identity_attribute)),
            Self::Or(children) => children.iter().any(|p| p.matches(entity, identity_attribute)),
        }
    }
}

impl Condition {
    fn matches(&self, entity: &Entity, identity_attribute: &str) -> bool {
        let id;
        let actual: &[Value] = if self.attribute == identity_attribute {
            id = [Value::Text(entity.id.clone())];
            &id
        } else {
            entity.get(&self.attribute).unwrap_or(&[])
        };

        let held = if matches!(self.values.as_slice(), [Value::Null]) {
            self.op == CompareOp::Equals && actual.iter().all(|v| *v == Value::Null)
        } else {
            actual
                .iter()
                .any(|a| self.values.iter().any(|expected| compare(self.op, a, expected)))
        };
        held != self.negated
    }
}

fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Equals => ordering(actual, expected) == Some(Ordering::Equal),
        CompareOp::Contains => text_pair(actual, expected).is_some_and(|(a, e)| a.contains(&e)),
        CompareOp::StartsWith => {
            text_pair(actual, expected).is_some_and(|(a, e)| a.starts_with(&e))
        }
        CompareOp::EndsWith => text_pair(actual, expected).is_some_and(|(a, e)| a.ends_with(&e)),
        CompareOp::GreaterThan => ordering(actual, expected) == Some(Ordering::Greater),
        CompareOp::GreaterOrEqual => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::LessThan => ordering(actual, expected) == Some(Ordering::Less),
        CompareOp::LessOrEqual => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn text_pair(actual: &Value, expected: &Value) -> Option<(String, String)> {
    Some((actual.as_scalar()?, expected.as_scalar()?))
}

/// Orders two values natively when they share a kind, otherwise by their
/// scalar renderings.
fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Text(a), Value::Text(e)) => Some(a.cmp(e)),
        (Value::Date(a), Value::Date(e)) => Some(a.cmp(e)),
        (Value::Decimal(a), Value::Decimal(e)) => a.partial_cmp(e),
        (Value::Binary(a), Value::Binary(e)) => Some(a.cmp(e)),
        _ => {
            let (a, e) = text_pair(actual, expected)?;
            Some(a.cmp(&e))
        }
    }
}
