//! Value → fragment inference.
//!
//! `infer` derives the narrowest fragment describing one value. `Inference`
//! folds many samples into one fragment by feeding every sample's type to a
//! resolving generic, so the result is the widened union of the distinct
//! shapes seen.
use serde_json::{Map, Value};

use crate::fragment::{Field, Fragment, GenericsMap, Primitive};
use crate::matcher::{MatchContext, matches};

const SAMPLE: &str = "T";

pub fn infer(value: Option<&Value>) -> Fragment {
    match value {
        None => Fragment::primitive(Primitive::Void),
        Some(Value::Null) => Fragment::null(),
        Some(Value::Bool(_)) => Fragment::primitive(Primitive::Bool),
        Some(Value::Number(_)) => Fragment::primitive(Primitive::Float),
        Some(Value::String(_)) => Fragment::primitive(Primitive::String),
        Some(Value::Array(xs)) => infer_array(xs),
        Some(Value::Object(object)) => infer_object(object),
    }
}

/// Homogeneous arrays become `T[n]`; anything else is a tuple.
fn infer_array(xs: &[Value]) -> Fragment {
    let elements: Vec<Fragment> = xs.iter().map(|x| infer(Some(x))).collect();
    let Some(first) = elements.first() else {
        return Fragment::Tuple(None);
    };
    let homogeneous = elements.iter().all(|ty| {
        matches(first, ty, None, MatchContext::default()) && matches(ty, first, None, MatchContext::default())
    });
    if homogeneous {
        Fragment::array(first.clone(), elements.len())
    } else {
        Fragment::tuple(elements)
    }
}

fn infer_object(object: &Map<String, Value>) -> Fragment {
    Fragment::structure(object.iter().map(|(k, v)| (k.clone(), Field::required(infer(Some(v))))))
}

// ------------------------------- Front API -------------------------------- //

#[derive(Debug, Default)]
pub struct Inference {
    generics: GenericsMap,
}

impl Inference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_value(&mut self, v: &Value) {
        let observed = infer(Some(v));
        matches(&Fragment::generic(SAMPLE, None), &observed, Some(&mut self.generics), MatchContext::resolving());
    }

    /// `None` until at least one value was observed.
    pub fn solve(&self) -> Option<Fragment> {
        self.generics.get(SAMPLE).cloned()
    }
}

pub fn infer_from_values<'a, I>(values: I) -> Option<Fragment>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut inference = Inference::new();
    for v in values {
        inference.observe_value(v);
    }
    inference.solve()
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check;
    use crate::parse::parse;
    use serde_json::json;

    fn inferred(value: Value) -> String {
        infer(Some(&value)).to_string()
    }

    #[test]
    fn scalars() {
        assert_eq!(infer(None).to_string(), "void");
        assert_eq!(inferred(json!(null)), "null");
        assert_eq!(inferred(json!(true)), "bool");
        assert_eq!(inferred(json!(0)), "float");
        assert_eq!(inferred(json!("Hello, world!")), "string");
    }

    #[test]
    fn sequences() {
        assert_eq!(inferred(json!([])), "[]");
        assert_eq!(inferred(json!([1, 2, 3])), "float[3]");
        assert_eq!(inferred(json!([[1], [2]])), "float[1][2]");
        assert_eq!(inferred(json!(["a", 1])), "[string, float]");
        assert_eq!(inferred(json!([1, null])), "[float, null]");
    }

    #[test]
    fn keyed_collections() {
        assert_eq!(inferred(json!({})), "{}");
        assert_eq!(inferred(json!({ "b": 1, "a": "x" })), "{ b: float, a: string }");
        assert_eq!(inferred(json!({ "pos": [1, 2] })), "{ pos: float[2] }");
    }

    #[test]
    fn inferred_types_accept_their_value() {
        for value in [
            json!(null),
            json!([1, "a", [true, false]]),
            json!({ "k": { "nested": [] }, "n": null }),
        ] {
            assert!(check(&infer(Some(&value)), Some(&value), None, None), "{value}");
        }
    }

    #[test]
    fn samples_widen_to_a_union() {
        let samples = [json!(1), json!(2.5), json!("x"), json!(3)];
        let solved = infer_from_values(&samples).unwrap();
        assert_eq!(solved, parse("float | string").unwrap());
    }

    #[test]
    fn structs_with_extra_fields_are_covered_by_the_first_shape() {
        let samples = [json!({ "a": 1 }), json!({ "a": 2, "b": true })];
        let solved = infer_from_values(&samples).unwrap();
        assert_eq!(solved, parse("{ a: float }").unwrap());
    }

    #[test]
    fn nothing_observed() {
        assert_eq!(Inference::new().solve(), None);
    }
}
