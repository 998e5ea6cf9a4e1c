//! Filter expressions for `Store::list`.

use serde::{Deserialize, Serialize};

/// A value an indexed field may take. Kept small and closed so the SQLite
/// index can store it in a single typed column pair (kind, text/int).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    pub(crate) fn as_text(&self) -> String {
        match self {
            IndexValue::Text(s) => s.clone(),
            IndexValue::Int(i) => i.to_string(),
            IndexValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Text(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        IndexValue::Text(s)
    }
}

impl From<i64> for IndexValue {
    fn from(i: i64) -> Self {
        IndexValue::Int(i)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        IndexValue::Bool(b)
    }
}

/// Comparison operator for a single filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// A single `field <op> value` clause. `Store::list` ANDs all clauses in a
/// `Filter` together; callers compose multiple `Filter::and` for more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<IndexValue>) -> Self {
        Self {
            field,
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(field: &'static str, value: impl Into<IndexValue>) -> Self {
        Self {
            field,
            op: FilterOp::Ne,
            value: value.into(),
        }
    }

    pub(crate) fn matches(&self, fields: &[(&'static str, IndexValue)]) -> bool {
        let Some((_, actual)) = fields.iter().find(|(name, _)| *name == self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual.as_text() == self.value.as_text(),
            FilterOp::Ne => actual.as_text() != self.value.as_text(),
        }
    }
}
