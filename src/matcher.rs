//! Type-to-type compatibility with generic resolution.
//!
//! `matches(receiving, received, ..)` asks whether every value described by
//! `received` may flow into a port declared as `receiving`. It is asymmetric:
//! the receiving side is dispatched first (generic/nullable/union/intersection
//! unwrap there), then the received side.
//!
//! In resolving mode (`MatchContext::resolving()`), receiving generics are
//! bound to what they receive and widened to a union when they receive
//! something incompatible with their current binding. Bindings live in a
//! caller-owned `GenericsMap` that must not be shared between independent
//! matching sessions.
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::check::check;
use crate::fragment::{Fragment, GenericsMap, Literal, Primitive};

/// What a free received generic may instantiate to.
static NULLABLE_ANY: Lazy<Fragment> = Lazy::new(|| Fragment::nullable(Fragment::any()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchContext {
    /// The current position already tolerates `null`.
    pub nullable: bool,
    /// Receiving generics are read, never bound.
    pub readonly_generics: bool,
}

impl Default for MatchContext {
    fn default() -> Self {
        MatchContext { nullable: false, readonly_generics: true }
    }
}

impl MatchContext {
    pub fn resolving() -> Self {
        MatchContext { readonly_generics: false, ..Self::default() }
    }

    fn with_nullable(self) -> Self {
        MatchContext { nullable: true, ..self }
    }
}

/// One matching session. Holds the (optional) generic bindings that every
/// recursive step of the session reads and, in resolving mode, extends.
pub struct Matcher<'g> {
    generics: Option<&'g mut GenericsMap>,
}

/// Convenience wrapper: a single-shot session over `generics`.
pub fn matches(
    receiving: &Fragment,
    received: &Fragment,
    generics: Option<&mut GenericsMap>,
    context: MatchContext,
) -> bool {
    Matcher::new(generics).matches(receiving, received, context)
}

impl<'g> Matcher<'g> {
    pub fn new(generics: Option<&'g mut GenericsMap>) -> Self {
        Matcher { generics }
    }

    pub fn generics(&self) -> Option<&GenericsMap> {
        self.generics.as_deref()
    }

    pub fn matches(&mut self, receiving: &Fragment, received: &Fragment, context: MatchContext) -> bool {
        // ---- received-side distribution ----
        match received {
            Fragment::Nullable(inner) => match inner.as_ref() {
                Fragment::Union { left, right } => {
                    return self.matches(receiving, &Fragment::nullable((**left).clone()), context)
                        && self.matches(receiving, &Fragment::nullable((**right).clone()), context);
                }
                Fragment::Intersection { left, right } => {
                    return self.matches(receiving, &Fragment::nullable((**left).clone()), context)
                        || self.matches(receiving, &Fragment::nullable((**right).clone()), context);
                }
                _ => {}
            },
            // every runtime shape of the union has to be accepted
            Fragment::Union { left, right } => {
                return self.matches(receiving, left, context) && self.matches(receiving, right, context);
            }
            _ => {}
        }

        // ---- receiving side ----
        match receiving {
            Fragment::Primitive(Primitive::Any) => {
                let excluded = matches!(
                    received,
                    Fragment::Generic { .. }
                        | Fragment::Named { .. }
                        | Fragment::Nullable(_)
                        | Fragment::Intersection { .. }
                        | Fragment::Literal(Literal::Null)
                );
                if !excluded {
                    return true;
                }
            }
            Fragment::Generic { name, extends } => {
                return self.match_receiving_generic(name, extends.as_deref(), received, context);
            }
            Fragment::Nullable(inner) => {
                return self.matches(inner, received, context.with_nullable());
            }
            Fragment::Intersection { left, right } => {
                return self.matches(left, received, context) && self.matches(right, received, context);
            }
            Fragment::Union { left, right } => {
                let context = if left.is_nullable() || right.is_nullable() {
                    context.with_nullable()
                } else {
                    context
                };
                return self.matches(left, received, context) || self.matches(right, received, context);
            }
            _ => {}
        }

        // ---- received side ----
        match (receiving, received) {
            (Fragment::Literal(expected), Fragment::Literal(actual)) => expected == actual,
            (_, Fragment::Literal(Literal::Null)) if context.nullable => true,
            (_, Fragment::Literal(lit)) => check(receiving, Some(&lit.to_value()), self.generics(), None),

            (Fragment::Primitive(a), Fragment::Primitive(b)) => a == b,

            (_, Fragment::Generic { extends: Some(bound), .. }) => self.matches(receiving, bound, context),
            (_, Fragment::Generic { extends: None, .. }) => self.matches(receiving, &NULLABLE_ANY, context),

            (Fragment::Tuple(expected), Fragment::Tuple(actual)) => match (expected, actual) {
                (None, None) => true,
                (Some(expected), Some(actual)) => {
                    // tuple slots are matched outside of this session
                    expected.len() == actual.len()
                        && expected
                            .iter()
                            .zip(actual)
                            .all(|(a, b)| Matcher::new(None).matches(a, b, MatchContext::default()))
                }
                _ => false,
            },

            (Fragment::Array { element: a, size: n }, Fragment::Array { element: b, size: m }) => {
                n == m && self.matches(a, b, MatchContext::default())
            }

            (Fragment::List(a), Fragment::List(b)) => self.matches(a, b, MatchContext::default()),

            (Fragment::Struct(expected), Fragment::Struct(actual)) => {
                let Some(expected) = expected else { return true };
                expected.iter().all(|(key, field)| {
                    match actual.as_ref().and_then(|fields| fields.get(key)) {
                        Some(other) => {
                            (field.optional || !other.optional) && self.matches(&field.ty, &other.ty, context)
                        }
                        None => field.optional,
                    }
                })
            }

            (Fragment::Map { key: k1, value: v1 }, Fragment::Map { key: k2, value: v2 }) => {
                self.matches(k1, k2, MatchContext::default()) && self.matches(v1, v2, MatchContext::default())
            }

            (Fragment::Named { name: n1, inner: i1 }, Fragment::Named { name: n2, inner: i2 }) => {
                n1 == n2
                    && match (i1, i2) {
                        (None, None) => true,
                        (Some(a), Some(b)) => self.matches(a, b, context),
                        _ => false,
                    }
            }
            // named types are transparent to structural receivers
            (_, Fragment::Named { inner, .. }) => match inner {
                Some(inner) => self.matches(receiving, inner, context),
                None => false,
            },

            (_, Fragment::Nullable(inner)) => context.nullable && self.matches(receiving, inner, context),

            (_, Fragment::Intersection { left, right }) => {
                let (l, r) = (left.is_nullable(), right.is_nullable());
                let context = if !context.nullable && l != r { context.with_nullable() } else { context };
                self.matches(receiving, left, context) || self.matches(receiving, right, context)
            }

            _ => false,
        }
    }

    fn match_receiving_generic(
        &mut self,
        name: &str,
        extends: Option<&Fragment>,
        received: &Fragment,
        context: MatchContext,
    ) -> bool {
        if self.generics.is_some() {
            let binding = self.generics().and_then(|map| map.get(name)).cloned();

            if context.readonly_generics {
                if let Some(binding) = binding {
                    return self.matches(&binding, received, context);
                }
            } else {
                if let Some(bound) = extends {
                    if !self.matches(bound, received, context) {
                        return false;
                    }
                }

                let widened = match binding {
                    None => {
                        trace!(generic = name, binding = %received, "bound generic");
                        received.clone()
                    }
                    Some(binding) => {
                        if self.matches(&binding, received, context) {
                            return true;
                        }
                        debug!(generic = name, from = %binding, with = %received, "widened generic binding");
                        Fragment::union(binding, received.clone())
                    }
                };
                if let Some(map) = self.generics.as_deref_mut() {
                    map.insert(name.to_string(), widened);
                }
                return true;
            }
        }

        extends.is_none_or(|bound| self.matches(bound, received, context))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
