//! Canonical textual rendering of fragments.
//!
//! Output reparses to the same tree: parentheses go wherever a sub-term
//! would otherwise bind differently (see `Term`).
use std::fmt;

use crate::fragment::{Fragment, Literal};

pub fn print(fragment: &Fragment) -> String {
    fragment.to_string()
}

/// Where a sub-term is printed, and thus which of its forms need parentheses.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    /// generic bound, nullable inner
    Unary,
    /// array or list element
    Postfix,
    IntersectionLeft,
    IntersectionRight,
    UnionRight,
}

struct Term<'a>(&'a Fragment, Position);

impl fmt::Display for Term<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Term(fragment, position) = *self;
        let wrap = match (fragment, position) {
            (Fragment::Union { .. }, _) => true,
            (Fragment::Intersection { .. }, Position::IntersectionLeft) => false,
            (Fragment::Intersection { .. }, _) => true,
            (Fragment::Nullable(_), Position::Unary | Position::Postfix) => true,
            (Fragment::Generic { extends: Some(_), .. }, Position::Postfix) => true,
            _ => false,
        };
        if wrap {
            write!(f, "({fragment})")
        } else {
            write!(f, "{fragment}")
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Literal(lit) => write!(f, "{lit}"),
            Fragment::Primitive(p) => f.write_str(p.as_str()),
            Fragment::Generic { name, extends } => {
                f.write_str(name)?;
                match extends {
                    Some(bound) => write!(f, " extends {}", Term(bound, Position::Unary)),
                    None => Ok(()),
                }
            }
            Fragment::Tuple(None) => f.write_str("[]"),
            Fragment::Tuple(Some(elements)) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Fragment::Array { element, size } => write!(f, "{}[{size}]", Term(element, Position::Postfix)),
            Fragment::List(element) => write!(f, "{}[]", Term(element, Position::Postfix)),
            Fragment::Struct(None) => f.write_str("{}"),
            Fragment::Struct(Some(fields)) if fields.is_empty() => f.write_str("{}"),
            Fragment::Struct(Some(fields)) => {
                f.write_str("{ ")?;
                for (i, (key, field)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_key(f, key)?;
                    let marker = if field.optional { "?" } else { "" };
                    write!(f, "{marker}: {}", field.ty)?;
                }
                f.write_str(" }")
            }
            Fragment::Map { key, value } => write!(f, "{{ [{key}]: {value} }}"),
            Fragment::Named { name, inner } => match inner {
                Some(inner) => write!(f, "{name}{{{inner}}}"),
                None => write!(f, "{name}{{}}"),
            },
            Fragment::Nullable(inner) => write!(f, "?{}", Term(inner, Position::Unary)),
            Fragment::Intersection { left, right } => write!(
                f,
                "{} & {}",
                Term(left, Position::IntersectionLeft),
                Term(right, Position::IntersectionRight),
            ),
            // unions are the loosest form, so the left operand never needs parentheses
            Fragment::Union { left, right } => write!(f, "{left} | {}", Term(right, Position::UnionRight)),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) if n.0.is_finite() => write!(f, "{}", n.0),
            Literal::Number(_) => f.write_str("null"),
            Literal::String(s) => write_json_string(f, s),
        }
    }
}

fn write_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    let mut chars = key.chars();
    let plain = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        f.write_str(key)
    } else {
        write_json_string(f, key)
    }
}

fn write_json_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    f.write_str(&quoted)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Primitive;
    use crate::parse::parse;

    fn reprint(src: &str) -> String {
        print(&parse(src).unwrap())
    }

    #[test]
    fn canonical_forms() {
        assert_eq!(reprint("\"string\""), "\"string\"");
        assert_eq!(reprint("null"), "null");
        assert_eq!(reprint("1.25"), "1.25");
        assert_eq!(reprint("3"), "3");
        assert_eq!(reprint("string"), "string");
        assert_eq!(reprint("any"), "any");
        assert_eq!(reprint("T"), "T");
        assert_eq!(reprint("T2 extends string"), "T2 extends string");
        assert_eq!(reprint("[]"), "[]");
        assert_eq!(reprint("[float, int, bool]"), "[float, int, bool]");
        assert_eq!(reprint("int[4]"), "int[4]");
        assert_eq!(reprint("(?(int | float))[4]"), "(?(int | float))[4]");
        assert_eq!(reprint("any[]"), "any[]");
        assert_eq!(reprint("(?bool)[]"), "(?bool)[]");
        assert_eq!(reprint("{}"), "{}");
        assert_eq!(reprint("{ key: string, key2?: int }"), "{ key: string, key2?: int }");
        assert_eq!(reprint("{ [string]: int }"), "{ [string]: int }");
        assert_eq!(reprint("color{}"), "color{}");
        assert_eq!(reprint("date{string | int}"), "date{string | int}");
        assert_eq!(reprint("?int"), "?int");
        assert_eq!(reprint("?(float | int)"), "?(float | int)");
        assert_eq!(reprint("{} & { key: string } & { key2: int }"), "{} & { key: string } & { key2: int }");
        assert_eq!(reprint("int | bool | float"), "int | bool | float");
    }

    #[test]
    fn parenthesizes_where_precedence_requires() {
        assert_eq!(reprint("(int | float) & 1"), "(int | float) & 1");
        assert_eq!(reprint("int | (string | char)"), "int | (string | char)");
        assert_eq!(reprint("int & float | string"), "int & float | string");
        assert_eq!(reprint("(T extends int)[]"), "(T extends int)[]");
        assert_eq!(reprint("T extends ?int"), "T extends (?int)");
        assert_eq!(reprint("{ \"odd key\": int }"), "{ \"odd key\": int }");
    }

    #[test]
    fn reparses_to_the_same_tree() {
        for src in [
            "null",
            "-0.5",
            "\"quo\\\"te\"",
            "T extends (string | int)",
            "date{T extends (string | int)}",
            "[int, ?string, { a: int }]",
            "(?int)[3][]",
            "?int[3]",
            "{ [\"a\" | \"b\"]: ?(int & float) }",
            "(a{} | b{int}) & c{?string}",
            "int | (string & (char | bool))",
            "((int & float) & string) & bool",
            "int & (float & string)",
            "?(?int)",
        ] {
            let parsed = parse(src).unwrap();
            let printed = print(&parsed);
            assert_eq!(parse(&printed).unwrap(), parsed, "{src} printed as {printed}");
        }
    }

    #[test]
    fn empty_schemas_print_as_open_struct() {
        assert_eq!(print(&Fragment::Struct(Some(Default::default()))), "{}");
        assert_eq!(
            print(&Fragment::list(Fragment::generic("T", Some(Fragment::primitive(Primitive::Int))))),
            "(T extends int)[]",
        );
    }
}
