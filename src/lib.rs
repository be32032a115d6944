//! Structural type algebra for flow-based-programming ports.
//!
//! Fragments describe literal, primitive, generic, tuple, array, list,
//! struct, map, named, nullable, union and intersection types. On top of the
//! model sit three operations:
//!
//! - [`check`]: does a runtime value conform to a fragment
//! - [`matches`]: does a received fragment satisfy a receiving one, resolving
//!   generic parameters along the way
//! - [`infer`]: derive a fragment from a value
pub mod check;
pub mod fragment;
pub mod infer;
pub mod matcher;
pub mod nullability;
pub mod parse;
pub mod path_de;
pub mod print;

pub use check::check;
pub use fragment::{CheckerMap, Field, Fragment, GenericsMap, Literal, Primitive, Validator};
pub use infer::{Inference, infer};
pub use matcher::{MatchContext, Matcher, matches};
pub use nullability::{convert_null, is_nullable};
pub use parse::{ParseError, parse};
pub use print::print;
