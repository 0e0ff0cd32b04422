//! Uniform path arithmetic over local filesystem paths and remote HTTP(S) URLs.
//!
//! Everything here is pure string manipulation: no filesystem or network access.

use std::path::Path;
use url::Url;

/// Returns `true` when the path is an `http://` or `https://` URL.
pub fn is_remote(path: &str) -> bool {
    Url::parse(path)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Directory containing `path`. For URLs the last path segment is dropped and the
/// scheme/host are preserved.
pub fn parent(path: &str) -> String {
    if is_remote(path) {
        let (origin, rest) = split_origin(path);
        let trimmed = rest.trim_end_matches('/');
        return match trimmed.rfind('/') {
            Some(index) => format!("{}{}", origin, &trimmed[..index]),
            None => origin.to_string(),
        };
    }

    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Join `relative` onto `root` using the transport's separator rules.
pub fn join(root: &str, relative: &str) -> String {
    if is_remote(root) {
        let relative = relative.trim_start_matches("./").trim_start_matches('/');
        return format!("{}/{}", root.trim_end_matches('/'), relative);
    }

    Path::new(root).join(relative).to_string_lossy().to_string()
}

/// Final segment of a local path or URL.
pub fn basename(path: &str) -> String {
    if is_remote(path) {
        let (_, rest) = split_origin(path);
        return rest
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
    }

    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Base name without its final extension, e.g. `my-lib.gflowslib` -> `my-lib`.
pub fn stem(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 => name[..index].to_string(),
        _ => name,
    }
}

/// Splits `scheme://host[:port]` from the path part of a URL.
fn split_origin(url: &str) -> (&str, &str) {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(index) => url.split_at(after_scheme + index),
        None => (url, ""),
    }
}
