#![allow(clippy::result_large_err)]

//! Conversion of generated workflows back into template source.

pub mod serializer;

pub use serializer::{is_bare_key, to_template_source, unquote_keys};

use crate::core::engine::strip_provenance_header;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde_yaml::{Mapping, Value};

/// Top-level key that YAML 1.1 emitters and parsers read as boolean `true`.
pub const TRIGGER_KEY: &str = "on";

/// Parse generated output into an ordered document ready for serialization.
///
/// A top-level boolean `true` key is rewritten to `on`; remaining non-string keys are
/// stringified.
pub fn normalize(content: &str) -> Result<Value, AppError> {
    let body = strip_provenance_header(content);
    let document: Value = serde_yaml::from_str(body)?;
    let Value::Mapping(mapping) = document else {
        return Err(AppError::new(
            ErrorCategory::SerializationError,
            "workflow file must contain a mapping at the top level",
        ));
    };

    let mut normalized = Mapping::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = match key {
            Value::Bool(true) => TRIGGER_KEY.to_string(),
            other => key_string(other)?,
        };
        normalized.insert(Value::String(key), normalize_value(value)?);
    }
    Ok(Value::Mapping(normalized))
}

fn normalize_value(value: Value) -> Result<Value, AppError> {
    Ok(match value {
        Value::Mapping(mapping) => {
            let mut normalized = Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                normalized.insert(Value::String(key_string(key)?), normalize_value(value)?);
            }
            Value::Mapping(normalized)
        }
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(normalize_value)
                .collect::<Result<_, _>>()?,
        ),
        Value::Tagged(tagged) => normalize_value(tagged.value)?,
        other => other,
    })
}

fn key_string(key: Value) -> Result<String, AppError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(AppError::new(
            ErrorCategory::SerializationError,
            format!("unsupported mapping key: {:?}", other),
        )),
    }
}
