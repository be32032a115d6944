//! JSON inputs with JSON-path context in error messages.
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::fragment::GenericsMap;
use crate::parse::{ParseError, parse};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("at JSON path {path} → {source}")]
    Json { path: String, source: serde_json::Error },
    #[error("generic `{name}` → {source}")]
    Type { name: String, source: ParseError },
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, LoadError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| LoadError::Json {
        path: err.path().to_string(),
        source: err.into_inner(),
    })
}

/// Load a `{ "T": "int | string", .. }` object of textual bindings.
pub fn generics_from_str(src: &str) -> Result<GenericsMap, LoadError> {
    let raw: IndexMap<String, String> = from_str_with_path(src)?;
    raw.into_iter()
        .map(|(name, text)| match parse(&text) {
            Ok(fragment) => Ok((name, fragment)),
            Err(source) => Err(LoadError::Type { name, source }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_textual_bindings() {
        let generics = generics_from_str(r#"{ "T": "int | string", "U": "?bool" }"#).unwrap();
        assert_eq!(generics.keys().collect::<Vec<_>>(), ["T", "U"]);
        assert_eq!(generics["U"], parse("?bool").unwrap());
    }

    #[test]
    fn reports_the_failing_path() {
        let err = generics_from_str(r#"{ "T": 1 }"#).unwrap_err();
        assert!(matches!(&err, LoadError::Json { path, .. } if path == "T"), "{err}");

        let err = generics_from_str(r#"{ "T": "int |" }"#).unwrap_err();
        assert!(matches!(err, LoadError::Type { ref name, .. } if name == "T"));
    }
}
