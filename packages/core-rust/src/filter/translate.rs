//! Predicate-to-native filter translation.
//!
//! The external algebra is narrow: one logical operator per query, no
//! duplicate `(parameter, field)` pairs under `AND`, no negated range
//! comparisons, a single scalar value per condition. Anything else is
//! reported as `None`, and the caller fetches unrestricted and filters the
//! decoded entities with [`Predicate::matches`](crate::predicate::Predicate::matches).
//! There is no partial push-down: a `None` anywhere inside a boolean node
//! makes the whole node `None`.

use std::collections::HashSet;

use tracing::debug;

use super::{BoolKind, FilterGroup, FilterLeaf, FilterModel, FilterOp};
use crate::predicate::{CompareOp, Condition, Predicate};

/// Wildcard marker of the native pattern options.
pub const WILDCARD: char = '*';

/// Kind of entity a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Accounts: full native filtering on allow-listed attributes.
    Account,
    /// Table-backed entities: only identity equality is native.
    Table,
}

/// Attributes the remote list call can filter on.
///
/// A dotted name `PARAM.FIELD` addresses a field of a structured parameter;
/// an undotted name addresses a parameter as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeAllowList {
    attributes: HashSet<String>,
}

impl NativeAllowList {
    #[must_use]
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    /// Splits an allow-listed attribute into `(parameter, field)`.
    #[must_use]
    pub fn resolve(&self, attribute: &str) -> Option<(String, Option<String>)> {
        if !self.contains(attribute) {
            return None;
        }
        Some(match attribute.split_once('.') {
            Some((parameter, field)) => (parameter.to_string(), Some(field.to_string())),
            None => (attribute.to_string(), None),
        })
    }
}

impl<S: Into<String>> FromIterator<S> for NativeAllowList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Translates predicate trees into [`FilterModel`]s.
#[derive(Debug, Clone)]
pub struct FilterTranslator {
    identity_attribute: String,
}

impl FilterTranslator {
    #[must_use]
    pub fn new(identity_attribute: impl Into<String>) -> Self {
        Self {
            identity_attribute: identity_attribute.into(),
        }
    }

    #[must_use]
    pub fn identity_attribute(&self) -> &str {
        &self.identity_attribute
    }

    /// Translates `predicate` for the given entity kind.
    ///
    /// Returns `None` when the predicate has no native representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use idbridge_core::filter::{EntityKind, FilterModel, FilterTranslator, NativeAllowList};
    /// use idbridge_core::predicate::Predicate;
    ///
    /// let translator = FilterTranslator::new("USERNAME");
    /// let model = translator.translate(
    ///     &Predicate::contains("USERNAME", "ohn"),
    ///     EntityKind::Account,
    ///     &NativeAllowList::default(),
    /// );
    /// assert_eq!(model, Some(FilterModel::KeyContains("*ohn*".to_string())));
    /// ```
    #[must_use]
    pub fn translate(
        &self,
        predicate: &Predicate,
        kind: EntityKind,
        allow_list: &NativeAllowList,
    ) -> Option<FilterModel> {
        match predicate {
            Predicate::Compare(condition) => match kind {
                EntityKind::Account => self.translate_condition(condition, allow_list),
                EntityKind::Table => self.translate_identity_equals(condition),
            },
            Predicate::And(children) => {
                self.translate_group(BoolKind::And, children, kind, allow_list)
            }
            Predicate::Or(children) => {
                self.translate_group(BoolKind::Or, children, kind, allow_list)
            }
        }
    }

    fn translate_identity_equals(&self, condition: &Condition) -> Option<FilterModel> {
        if condition.op != CompareOp::Equals
            || condition.negated
            || condition.attribute != self.identity_attribute
        {
            debug!(attribute = %condition.attribute, "only identity equality is native for tables");
            return None;
        }
        single_scalar(condition).map(FilterModel::KeyEquals)
    }

    fn translate_condition(
        &self,
        condition: &Condition,
        allow_list: &NativeAllowList,
    ) -> Option<FilterModel> {
        let value = single_scalar(condition)?;
        let is_identity = condition.attribute == self.identity_attribute;
        let negated = condition.negated;

        match condition.op {
            CompareOp::Equals if is_identity => {
                if negated {
                    debug!(
                        attribute = %condition.attribute,
                        "negated identity equality is not native"
                    );
                    return None;
                }
                Some(FilterModel::KeyEquals(value))
            }
            CompareOp::Contains if is_identity => {
                if negated {
                    debug!(
                        attribute = %condition.attribute,
                        "negated identity match is not native"
                    );
                    return None;
                }
                Some(FilterModel::KeyContains(format!("{WILDCARD}{value}{WILDCARD}")))
            }
            CompareOp::Equals => {
                let op = if negated { FilterOp::NotEqual } else { FilterOp::Equal };
                leaf(allow_list, &condition.attribute, op, value)
            }
            CompareOp::Contains => leaf(
                allow_list,
                &condition.attribute,
                pattern_op(negated),
                format!("{WILDCARD}{value}{WILDCARD}"),
            ),
            CompareOp::StartsWith => leaf(
                allow_list,
                &condition.attribute,
                pattern_op(negated),
                format!("{value}{WILDCARD}"),
            ),
            CompareOp::EndsWith => leaf(
                allow_list,
                &condition.attribute,
                pattern_op(negated),
                format!("{WILDCARD}{value}"),
            ),
            CompareOp::GreaterThan
            | CompareOp::GreaterOrEqual
            | CompareOp::LessThan
            | CompareOp::LessOrEqual => {
                if negated {
                    debug!(
                        attribute = %condition.attribute,
                        "negated range comparison is not native"
                    );
                    return None;
                }
                let op = match condition.op {
                    CompareOp::GreaterThan => FilterOp::Greater,
                    CompareOp::GreaterOrEqual => FilterOp::GreaterOrEqual,
                    CompareOp::LessThan => FilterOp::Less,
                    _ => FilterOp::LessOrEqual,
                };
                leaf(allow_list, &condition.attribute, op, value)
            }
        }
    }

    fn translate_group(
        &self,
        kind: BoolKind,
        children: &[Predicate],
        entity_kind: EntityKind,
        allow_list: &NativeAllowList,
    ) -> Option<FilterModel> {
        let (first, rest) = children.split_first()?;
        let first = self.translate(first, entity_kind, allow_list)?;
        rest.iter().try_fold(first, |acc, child| {
            let right = self.translate(child, entity_kind, allow_list)?;
            merge(kind, acc, right)
        })
    }
}

fn pattern_op(negated: bool) -> FilterOp {
    if negated {
        FilterOp::NotContainsPattern
    } else {
        FilterOp::ContainsPattern
    }
}

/// The single scalar value of a condition, or `None` for multi-valued,
/// null, or binary operands.
fn single_scalar(condition: &Condition) -> Option<String> {
    match condition.values.as_slice() {
        [value] => value.as_scalar(),
        _ => {
            debug!(
                attribute = %condition.attribute,
                values = condition.values.len(),
                "condition needs exactly one value"
            );
            None
        }
    }
}

fn leaf(
    allow_list: &NativeAllowList,
    attribute: &str,
    op: FilterOp,
    value: String,
) -> Option<FilterModel> {
    let Some((parameter, field)) = allow_list.resolve(attribute) else {
        debug!(attribute, "attribute is not natively filterable");
        return None;
    };
    Some(FilterModel::Leaf(FilterLeaf {
        parameter,
        field,
        op,
        value,
    }))
}

/// Operands a side contributes to a combination of `kind`.
fn operands(kind: BoolKind, model: FilterModel) -> Option<Vec<FilterModel>> {
    match model {
        FilterModel::Group(group) if group.kind == kind => Some(group.children),
        FilterModel::Group(group) => {
            debug!(outer = ?kind, inner = ?group.kind, "mixed logical operators are not native");
            None
        }
        FilterModel::Leaf(_) => Some(vec![model]),
        FilterModel::KeyEquals(_) | FilterModel::KeyContains(_) | FilterModel::Opaque(_) => {
            debug!(?kind, "identity shortcuts cannot be combined");
            None
        }
    }
}

fn target(model: &FilterModel) -> Option<(&str, Option<&str>)> {
    match model {
        FilterModel::Leaf(leaf) => Some((leaf.parameter.as_str(), leaf.field.as_deref())),
        _ => None,
    }
}

/// Combines two translated sides under `kind`, flattening same-kind groups.
fn merge(kind: BoolKind, left: FilterModel, right: FilterModel) -> Option<FilterModel> {
    let mut children = operands(kind, left)?;
    let additions = operands(kind, right)?;

    for added in additions {
        if kind == BoolKind::And {
            if let Some(key) = target(&added) {
                if children.iter().any(|existing| target(existing) == Some(key)) {
                    debug!(
                        parameter = key.0,
                        field = key.1,
                        "field constrained twice under AND is not native"
                    );
                    return None;
                }
            }
        }
        children.push(added);
    }

    Some(FilterModel::Group(FilterGroup { kind, children }))
}
