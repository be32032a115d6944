//! Runtime value conformance.
//!
//! `check` is total: a mismatch of any kind is `false`, never an error. The
//! absent value (a missing struct key, or `void`) is passed as `None` and is
//! distinct from `Some(&Value::Null)`.
use serde_json::Value;

use crate::fragment::{CheckerMap, Fragment, GenericsMap, Primitive};

/// Does `value` conform to `fragment`?
///
/// Generics resolve through `generics` when bound, otherwise through their
/// `extends` bound; a free generic accepts anything. Named types consult
/// `checkers` after their inner type passes.
pub fn check(
    fragment: &Fragment,
    value: Option<&Value>,
    generics: Option<&GenericsMap>,
    checkers: Option<&CheckerMap>,
) -> bool {
    let recurse = |ty: &Fragment, v: Option<&Value>| check(ty, v, generics, checkers);

    match fragment {
        Fragment::Literal(lit) => value.is_some_and(|v| lit.is(v)),
        Fragment::Primitive(p) => check_primitive(*p, value),
        Fragment::Generic { name, extends } => {
            if let Some(bound) = generics.and_then(|map| map.get(name)) {
                return recurse(bound, value);
            }
            extends.as_deref().is_none_or(|bound| recurse(bound, value))
        }
        Fragment::Tuple(elements) => {
            let Some(Value::Array(xs)) = value else { return false };
            match elements {
                None => xs.is_empty(),
                Some(elements) => {
                    xs.len() == elements.len()
                        && elements.iter().zip(xs).all(|(ty, x)| recurse(ty, Some(x)))
                }
            }
        }
        Fragment::Array { element, size } => {
            let Some(Value::Array(xs)) = value else { return false };
            xs.len() == *size && xs.iter().all(|x| recurse(element, Some(x)))
        }
        Fragment::List(element) => {
            let Some(Value::Array(xs)) = value else { return false };
            xs.iter().all(|x| recurse(element, Some(x)))
        }
        Fragment::Struct(fields) => {
            let Some(Value::Object(object)) = value else { return false };
            let Some(fields) = fields else { return true };
            // extra keys on the value are ignored
            fields.iter().all(|(key, field)| {
                let entry = object.get(key);
                (field.optional && entry.is_none()) || recurse(&field.ty, entry)
            })
        }
        Fragment::Map { key, value: value_ty } => {
            let Some(Value::Object(object)) = value else { return false };
            object.iter().all(|(k, v)| {
                recurse(key, Some(&Value::String(k.clone()))) && recurse(value_ty, Some(v))
            })
        }
        Fragment::Named { name, inner } => {
            if let Some(inner) = inner {
                if !recurse(inner, value) {
                    return false;
                }
            }
            match checkers.and_then(|map| map.get(name)) {
                Some(validator) => validator(value),
                None => true,
            }
        }
        Fragment::Nullable(inner) => matches!(value, Some(Value::Null)) || recurse(inner, value),
        Fragment::Intersection { left, right } => recurse(left, value) && recurse(right, value),
        Fragment::Union { left, right } => recurse(left, value) || recurse(right, value),
    }
}

fn check_primitive(primitive: Primitive, value: Option<&Value>) -> bool {
    match (primitive, value) {
        (Primitive::Void, value) => value.is_none(),
        (_, None) => false,
        (Primitive::Any, Some(v)) => !v.is_null(),
        (Primitive::Bool, Some(v)) => v.is_boolean(),
        (Primitive::Char, Some(v)) => v.as_str().is_some_and(|s| s.chars().count() == 1),
        (Primitive::Int, Some(v)) => v.as_f64().is_some_and(is_int32),
        (Primitive::Float, Some(v)) => v.is_number(),
        (Primitive::String, Some(v)) => v.is_string(),
    }
}

/// Integral and unchanged by truncation to 32 bits.
fn is_int32(n: f64) -> bool {
    n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use serde_json::json;

    fn ok(src: &str, value: Value) -> bool {
        check(&parse(src).unwrap(), Some(&value), None, None)
    }

    fn ok_with(src: &str, value: Value, generics: &GenericsMap) -> bool {
        check(&parse(src).unwrap(), Some(&value), Some(generics), None)
    }

    fn bindings(pairs: &[(&str, &str)]) -> GenericsMap {
        pairs.iter().map(|(k, v)| (k.to_string(), parse(v).unwrap())).collect()
    }

    #[test]
    fn literals() {
        assert!(ok("null", json!(null)));
        assert!(ok("3", json!(3)));
        assert!(ok("\"3\"", json!("3")));
        assert!(ok("false", json!(false)));

        assert!(!check(&parse("null").unwrap(), None, None, None));
        assert!(!ok("\"3\"", json!(3)));
    }

    #[test]
    fn primitives() {
        assert!(ok("any", json!([])));
        assert!(ok("any", json!(0)));
        assert!(ok("any", json!("string")));
        assert!(ok("bool", json!(true)));
        assert!(ok("char", json!("c")));
        assert!(ok("int", json!(0)));
        assert!(ok("int", json!(-7.0)));
        assert!(ok("float", json!(1)));
        assert!(ok("float", json!(0.32)));

        assert!(!ok("any", json!(null)));
        assert!(!ok("bool", json!(0)));
        assert!(!ok("char", json!("str")));
        // one Unicode scalar value, not one UTF-16 unit
        assert!(ok("char", json!("😀")));
        assert!(!ok("char", json!("e\u{301}")));
        assert!(!ok("char", json!("")));
        assert!(!ok("int", json!(1.2)));
        assert!(!ok("int", json!(4294967296u64)));
    }

    #[test]
    fn void_accepts_only_absent() {
        let void = parse("void").unwrap();
        assert!(check(&void, None, None, None));
        assert!(!check(&void, Some(&json!(null)), None, None));
        assert!(!check(&parse("any").unwrap(), None, None, None));
    }

    #[test]
    fn generics() {
        assert!(ok("T", json!(0)));
        assert!(ok("T extends ?int", json!(0)));
        assert!(ok("T extends ?(char | bool)", json!(null)));
        assert!(ok_with("T", json!("str"), &bindings(&[("T", "string")])));
        assert!(ok_with("T", json!("str"), &GenericsMap::new()));
        assert!(ok_with("T extends int", json!(12), &GenericsMap::new()));

        assert!(!ok_with("T", json!(12), &bindings(&[("T", "string")])));
        assert!(!ok_with("T extends int", json!("str"), &GenericsMap::new()));
    }

    #[test]
    fn tuples() {
        assert!(ok("[string, int]", json!(["str", 1])));
        assert!(ok("[]", json!([])));

        assert!(!ok("[]", json!([0])));
        assert!(!ok("[string, int]", json!([1, "str"])));
        assert!(!ok("[string, int]", json!(["str"])));
        assert!(!ok("[string, int]", json!(["str", 1, 1])));
        assert!(!ok("[string]", json!("str")));
    }

    #[test]
    fn arrays() {
        assert!(ok("string[4]", json!(["str", "str2", "str3", "str4"])));
        assert!(ok("(?string)[4]", json!(["str", "str2", null, null])));

        assert!(!ok("string[1]", json!(["str", "str2"])));
        assert!(!ok("string[3]", json!(["str", "str2", "str3", "str4"])));
        assert!(!ok("string[4]", json!(["str", "str2", 1, "str4"])));
        assert!(!ok("string[1]", json!("str")));
    }

    #[test]
    fn lists() {
        assert!(ok("string[]", json!([])));
        assert!(ok("string[]", json!(["str"])));
        assert!(ok("string[]", json!(["str", "str2", "str3", "str4"])));

        assert!(!ok("string[]", json!(["str", 0, "str3"])));
        assert!(!ok("string[]", json!(["str", "str2", null])));
        assert!(!ok("string[]", json!("str")));
    }

    #[test]
    fn structs() {
        assert!(ok("{}", json!({})));
        assert!(ok("{}", json!({ "key": "string" })));
        assert!(ok("{ key: string }", json!({ "key": "string" })));
        assert!(ok(
            "{ key: (float | string) } & { key2: int, key3: ?bool, key4?: char, }",
            json!({ "key": 3.5, "key2": 7, "key3": false, "key5": "str" }),
        ));

        assert!(!ok("{ key: string }", json!({ "key": true })));
        assert!(!ok("{ key: string }", json!({})));
        assert!(!ok("{ key: string }", json!("string")));
        assert!(!ok("{}", json!([])));
    }

    #[test]
    fn optional_field_present_must_conform() {
        assert!(ok("{ key?: int }", json!({})));
        assert!(ok("{ key?: int }", json!({ "key": 1 })));
        assert!(!ok("{ key?: int }", json!({ "key": "1" })));
        assert!(ok("{ key: void }", json!({})));
    }

    #[test]
    fn maps() {
        assert!(ok("{ [string]: string }", json!({})));
        assert!(ok("{ [string]: ?string }", json!({ "key": "string", "key2": null, "key3": "string2" })));
        assert!(ok("{ [\"a\" | \"b\"]: int }", json!({ "a": 1, "b": 2 })));

        assert!(!ok("{ [string]: string }", json!({ "key": "string", "key2": 1 })));
        assert!(!ok("{ [\"a\" | \"b\"]: int }", json!({ "c": 1 })));
        assert!(!ok("{ [string]: string }", json!("string")));
    }

    #[test]
    fn named_types() {
        assert!(ok("color{string}", json!("#fff")));
        assert!(ok("date{}", json!(0)));
        assert!(!ok("color{string}", json!(255)));

        let mut checkers = CheckerMap::new();
        checkers.insert(
            "color".to_string(),
            Box::new(|v: Option<&Value>| v.and_then(Value::as_str) == Some("#fff")),
        );
        let color = parse("color{string}").unwrap();
        assert!(check(&color, Some(&json!("#fff")), None, Some(&checkers)));
        assert!(!check(&color, Some(&json!("#000")), None, Some(&checkers)));
    }

    #[test]
    fn named_checker_prefix() {
        let mut checkers = CheckerMap::new();
        checkers.insert(
            "date".to_string(),
            Box::new(|v: Option<&Value>| v.and_then(Value::as_str).is_some_and(|s| s.starts_with('#'))),
        );
        let date = parse("date{string}").unwrap();
        assert!(check(&date, Some(&json!("#fff")), None, Some(&checkers)));
        assert!(!check(&date, Some(&json!("fff")), None, Some(&checkers)));
        // inner type runs before the checker
        assert!(!check(&date, Some(&json!(1)), None, Some(&checkers)));
    }

    #[test]
    fn nullables() {
        assert!(ok("?bool", json!(null)));
        assert!(ok("?bool", json!(false)));
        assert!(!ok("?bool", json!(0)));
    }

    #[test]
    fn intersections() {
        assert!(ok(
            "{ key: string } & { key2: string }",
            json!({ "key": "string", "key2": "string2", "key3": "string3" }),
        ));
        assert!(ok("(any[2] & int[2]) & any[2]", json!([1, 3])));

        assert!(!ok("{ key: string } & { key2: string }", json!({ "key": "string", "key3": "string3" })));
        assert!(!ok(
            "{ key: string } & { key2: string }",
            json!({ "key": "string", "key2": false, "key3": "string3" }),
        ));
    }

    #[test]
    fn unions() {
        let union = parse("string | void").unwrap();
        assert!(check(&union, Some(&json!("ok")), None, None));
        assert!(check(&union, None, None, None));
        assert!(!check(&union, Some(&json!(true)), None, None));
        assert!(ok("string | void | char | bool", json!("c")));
    }
}
