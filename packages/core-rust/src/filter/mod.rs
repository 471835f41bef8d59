//! Native filter model of the external system.
//!
//! The remote list call accepts a flat selection table: condition rows
//! (`parameter`, `field`, sign, option, low value) and combination rows
//! (`AND`/`OR` plus the number of following operands). Only one logical
//! operator can appear per combination and, under `AND`, a field can be
//! constrained only once. [`FilterModel`] mirrors exactly that algebra;
//! anything outside it is rejected by the [`FilterTranslator`] and evaluated
//! in memory instead.

mod translate;

use serde::{Deserialize, Serialize};

pub use translate::{EntityKind, FilterTranslator, NativeAllowList, WILDCARD};

use crate::predicate::Predicate;

/// Comparison options of a native condition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    Equal,
    NotEqual,
    ContainsPattern,
    NotContainsPattern,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl FilterOp {
    /// Two-letter option code used on the wire.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Equal => "EQ",
            Self::NotEqual => "NE",
            Self::ContainsPattern => "CP",
            Self::NotContainsPattern => "NP",
            Self::Greater => "GT",
            Self::GreaterOrEqual => "GE",
            Self::Less => "LT",
            Self::LessOrEqual => "LE",
        }
    }
}

/// Logical operator of a combination node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolKind {
    And,
    Or,
}

impl BoolKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// A single native comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLeaf {
    pub parameter: String,
    pub field: Option<String>,
    pub op: FilterOp,
    pub value: String,
}

/// A combination of filters sharing one logical operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub kind: BoolKind,
    pub children: Vec<FilterModel>,
}

impl FilterGroup {
    /// Number of operands, as announced by the combination row.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.children.len()
    }
}

/// Native filter, or the original predicate when no native form exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterModel {
    /// Fetch exactly the entity with this identifier.
    KeyEquals(String),
    /// Fetch entities whose identifier matches this wildcard pattern.
    KeyContains(String),
    Leaf(FilterLeaf),
    Group(FilterGroup),
    /// Not natively representable; evaluate in memory.
    Opaque(Predicate),
}

/// One row of the native selection table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SelectionRow {
    Condition {
        parameter: String,
        field: Option<String>,
        sign: &'static str,
        option: &'static str,
        low: String,
    },
    Combine {
        op: &'static str,
        count: usize,
    },
}

/// Include sign; exclusion is always expressed through the option code.
const SIGN_INCLUDE: &str = "I";

impl FilterModel {
    /// Whether the model can be pushed to the remote call.
    #[must_use]
    pub fn is_native(&self) -> bool {
        !matches!(self, Self::Opaque(_))
    }

    /// Flattens the model into selection rows in pre-order.
    ///
    /// Identity shortcuts and opaque filters produce no rows: the former
    /// select a dedicated fetch path, the latter are evaluated in memory.
    #[must_use]
    pub fn selection_rows(&self) -> Vec<SelectionRow> {
        let mut rows = Vec::new();
        self.push_rows(&mut rows);
        rows
    }

    fn push_rows(&self, rows: &mut Vec<SelectionRow>) {
        match self {
            Self::Leaf(leaf) => rows.push(SelectionRow::Condition {
                parameter: leaf.parameter.clone(),
                field: leaf.field.clone(),
                sign: SIGN_INCLUDE,
                option: leaf.op.code(),
                low: leaf.value.clone(),
            }),
            Self::Group(group) => {
                rows.push(SelectionRow::Combine {
                    op: group.kind.code(),
                    count: group.arity(),
                });
                for child in &group.children {
                    child.push_rows(rows);
                }
            }
            Self::KeyEquals(_) | Self::KeyContains(_) | Self::Opaque(_) => {}
        }
    }
}
