use std::env;

/// Environments that influence how console logs are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A developer running gflows from a terminal.
    Interactive,
    /// A CI job such as a GitHub Actions step checking workflows.
    Ci,
}

impl ExecutionContext {
    /// Whether ANSI escapes may be written to the console sink.
    pub fn allows_ansi(self, colors_enabled: bool) -> bool {
        colors_enabled && self == ExecutionContext::Interactive
    }
}

/// Detect the context from the conventional `CI` environment variable.
pub fn detect_context() -> ExecutionContext {
    match env::var("CI") {
        Ok(value) if is_truthy(&value) => ExecutionContext::Ci,
        _ => ExecutionContext::Interactive,
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case("false") && value != "0"
}
