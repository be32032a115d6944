//! Type fragment AST. Every other module operates on this tree.
//!
//! A fragment is an owned, acyclic value; two fragments are equal iff they
//! are structurally equal. Serialized form mirrors the `{type, data}` shape of
//! the textual language's parse tree.
use std::collections::HashMap;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Fragment {
    Literal(Literal),
    Primitive(Primitive),
    Generic {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extends: Option<Box<Fragment>>,
    },
    /// `None` is exactly the empty sequence.
    Tuple(Option<Vec<Fragment>>),
    Array {
        element: Box<Fragment>,
        size: usize,
    },
    List(Box<Fragment>),
    /// `None` accepts any keyed collection.
    Struct(Option<IndexMap<String, Field>>),
    Map {
        key: Box<Fragment>,
        value: Box<Fragment>,
    },
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inner: Option<Box<Fragment>>,
    },
    Nullable(Box<Fragment>),
    Intersection {
        left: Box<Fragment>,
        right: Box<Fragment>,
    },
    Union {
        left: Box<Fragment>,
        right: Box<Fragment>,
    },
}

/// Concrete scalar payload of a literal fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Any,
    Void,
    Bool,
    Char,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub ty: Fragment,
    #[serde(default)]
    pub optional: bool,
}

/// Session-scoped generic bindings. Created fresh by the caller for every
/// independent matching operation; entries only grow or widen.
pub type GenericsMap = IndexMap<String, Fragment>;

/// Custom validator for a named type. `None` is the absent value.
pub type Validator = Box<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// Named-type validators, keyed by type name. Read-only during a check.
pub type CheckerMap = HashMap<String, Validator>;

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Fragment {
    pub fn literal(lit: impl Into<Literal>) -> Self {
        Fragment::Literal(lit.into())
    }

    pub fn null() -> Self {
        Fragment::Literal(Literal::Null)
    }

    pub fn primitive(p: Primitive) -> Self {
        Fragment::Primitive(p)
    }

    pub fn any() -> Self {
        Fragment::Primitive(Primitive::Any)
    }

    pub fn generic(name: impl Into<String>, extends: Option<Fragment>) -> Self {
        Fragment::Generic { name: name.into(), extends: extends.map(Box::new) }
    }

    /// Empty element lists collapse to the empty tuple.
    pub fn tuple(elements: Vec<Fragment>) -> Self {
        if elements.is_empty() {
            Fragment::Tuple(None)
        } else {
            Fragment::Tuple(Some(elements))
        }
    }

    pub fn array(element: Fragment, size: usize) -> Self {
        Fragment::Array { element: Box::new(element), size }
    }

    pub fn list(element: Fragment) -> Self {
        Fragment::List(Box::new(element))
    }

    /// Empty schemas collapse to the open struct `{}`.
    pub fn structure<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        let fields: IndexMap<String, Field> = fields.into_iter().map(|(k, f)| (k.into(), f)).collect();
        if fields.is_empty() {
            Fragment::Struct(None)
        } else {
            Fragment::Struct(Some(fields))
        }
    }

    pub fn map(key: Fragment, value: Fragment) -> Self {
        Fragment::Map { key: Box::new(key), value: Box::new(value) }
    }

    pub fn named(name: impl Into<String>, inner: Option<Fragment>) -> Self {
        Fragment::Named { name: name.into(), inner: inner.map(Box::new) }
    }

    pub fn nullable(inner: Fragment) -> Self {
        Fragment::Nullable(Box::new(inner))
    }

    pub fn intersection(left: Fragment, right: Fragment) -> Self {
        Fragment::Intersection { left: Box::new(left), right: Box::new(right) }
    }

    pub fn union(left: Fragment, right: Fragment) -> Self {
        Fragment::Union { left: Box::new(left), right: Box::new(right) }
    }
}

impl Literal {
    /// Strict equality against a runtime value. Numbers compare by `f64`.
    pub fn is(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Null, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Number(a), Value::Number(b)) => b.as_f64() == Some(a.0),
            (Literal::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            // non-finite numbers have no JSON form
            Literal::Number(n) => serde_json::Number::from_f64(n.0).map_or(Value::Null, Value::Number),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Bool(b) }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self { Literal::Number(OrderedFloat(n)) }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_string()) }
}

impl From<String> for Literal {
    fn from(s: String) -> Self { Literal::String(s) }
}

impl Primitive {
    pub const ALL: [Primitive; 7] = [
        Primitive::Any,
        Primitive::Void,
        Primitive::Bool,
        Primitive::Char,
        Primitive::Int,
        Primitive::Float,
        Primitive::String,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Any => "any",
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::String => "string",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == word)
    }
}

impl Field {
    pub fn required(ty: Fragment) -> Self {
        Field { ty, optional: false }
    }

    pub fn optional(ty: Fragment) -> Self {
        Field { ty, optional: true }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payloads_collapse_to_absent() {
        assert_eq!(Fragment::tuple(vec![]), Fragment::Tuple(None));
        assert_eq!(Fragment::structure(Vec::<(String, Field)>::new()), Fragment::Struct(None));
    }

    #[test]
    fn literal_numbers_compare_by_value() {
        let lit = Literal::from(3.0);
        assert!(lit.is(&json!(3)));
        assert!(lit.is(&json!(3.0)));
        assert!(!lit.is(&json!("3")));
        assert!(!Literal::Null.is(&json!(false)));
    }

    #[test]
    fn primitive_keywords() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_keyword(p.as_str()), Some(p));
        }
        assert_eq!(Primitive::from_keyword("nil"), None);
    }

    #[test]
    fn serializes_as_tagged_tree() {
        let frag = Fragment::nullable(Fragment::list(Fragment::primitive(Primitive::Int)));
        let encoded = serde_json::to_value(&frag).unwrap();
        assert_eq!(encoded, json!({
            "type": "nullable",
            "data": { "type": "list", "data": { "type": "primitive", "data": "int" } }
        }));
        let decoded: Fragment = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, frag);
    }
}
