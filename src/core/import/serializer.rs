#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use regex::Regex;
use std::sync::OnceLock;

/// Jsonnet keywords; keys matching one of these must stay quoted.
const RESERVED_WORDS: &[&str] = &[
    "assert",
    "else",
    "error",
    "false",
    "for",
    "function",
    "if",
    "import",
    "importstr",
    "importbin",
    "in",
    "local",
    "null",
    "self",
    "super",
    "tailstrict",
    "then",
    "true",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// `true` when `key` can be written as a bare Jsonnet field name.
pub fn is_bare_key(key: &str) -> bool {
    identifier_pattern().is_match(key) && !RESERVED_WORDS.contains(&key)
}

/// Render a document as a Jsonnet template that manifests it back to YAML.
pub fn to_template_source(document: &serde_yaml::Value) -> Result<String, AppError> {
    let json = serde_json::to_string_pretty(document)?;
    let literal = unquote_keys(&json)?;
    Ok(format!(
        "local workflow = {};\n\nstd.manifestYamlDoc(workflow)\n",
        literal
    ))
}

/// Re-scan pretty-printed JSON and rewrite each object key token in place, leaving
/// bare identifiers unquoted. Everything else, including key order, is untouched.
pub fn unquote_keys(json: &str) -> Result<String, AppError> {
    let mut output = String::with_capacity(json.len());
    let mut chars = json.char_indices();

    while let Some((start, c)) = chars.next() {
        if c != '"' {
            output.push(c);
            continue;
        }

        let mut end = json.len();
        let mut escaped = false;
        for (index, ch) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                end = index + 1;
                break;
            }
        }

        let token = &json[start..end];
        if json[end..].trim_start().starts_with(':') {
            let key: String = serde_json::from_str(token)?;
            if is_bare_key(&key) {
                output.push_str(&key);
                continue;
            }
        }
        output.push_str(token);
    }

    Ok(output)
}
