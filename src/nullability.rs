//! Nullability analysis: can a fragment describe `null`?
use serde_json::Value;

use crate::fragment::{Fragment, Literal};

pub fn is_nullable(fragment: &Fragment) -> bool {
    match fragment {
        Fragment::Nullable(_) => true,
        Fragment::Literal(lit) => *lit == Literal::Null,
        Fragment::Named { inner, .. } => inner.as_deref().is_some_and(is_nullable),
        Fragment::Intersection { left, right } => is_nullable(left) && is_nullable(right),
        Fragment::Union { left, right } => is_nullable(left) || is_nullable(right),
        _ => false,
    }
}

impl Fragment {
    pub fn is_nullable(&self) -> bool {
        is_nullable(self)
    }
}

/// Collapse the absent value to `null`.
pub fn convert_null(value: Option<&Value>) -> Value {
    value.cloned().unwrap_or(Value::Null)
}
