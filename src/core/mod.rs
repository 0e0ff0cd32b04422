pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod import;
pub mod library;
pub mod manager;
pub mod package;
pub mod paths;
pub mod reader;
pub mod types;
pub mod validation;
pub mod writer;

pub use config::{ConfigLoader, EngineKind, GflowsConfig};
pub use context::{colors_enabled, Context, ContextOptions};
pub use engine::{create_engine, Definition, TemplateBackend, TemplateEngine, TemplateVars};
pub use error::AppError;
pub use library::{Library, LibraryResolver};
pub use manager::{CheckSummary, WorkflowManager};
pub use package::{Package, PathInfo};
pub use reader::{ContentReader, DefaultContentReader};
pub use types::*;
pub use validation::{JsonSchemaValidator, SchemaValidator, ValidationResult, Validator};
pub use writer::{ContentWriter, WriteOutcome};
