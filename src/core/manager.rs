#![allow(clippy::result_large_err)]

//! Orchestrates check, update, import and listing on top of the active engine.

use crate::core::context::Context;
use crate::core::engine::{Definition, GeneratorManifest, TemplateEngine, TemplateVars};
use crate::core::error::AppError;
use crate::core::types::WriteAction;
use crate::core::validation::{ValidationResult, Validator};
use crate::core::writer::{ContentWriter, WriteOutcome};
use crossterm::style::Stylize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Aggregate outcome of a check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub checked: usize,
    pub failed: Vec<String>,
}

impl CheckSummary {
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Aggregate outcome of an update run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub written: Vec<WriteOutcome>,
    pub failed: Vec<String>,
}

impl UpdateSummary {
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn changed(&self) -> usize {
        self.written.iter().filter(|o| o.changed()).count()
    }
}

/// Terminal styling, disabled entirely when colors are off.
#[derive(Debug, Clone, Copy)]
struct Styler {
    enabled: bool,
}

impl Styler {
    fn ok(&self, text: &str) -> String {
        if self.enabled {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    fn failed(&self, text: &str) -> String {
        if self.enabled {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.enabled {
            text.dark_grey().to_string()
        } else {
            text.to_string()
        }
    }

    fn action(&self, action: WriteAction) -> String {
        let label = format!("{:>9}", action.to_string());
        if !self.enabled {
            return label;
        }
        match action {
            WriteAction::Create => label.green().bold().to_string(),
            WriteAction::Update => label.yellow().bold().to_string(),
            WriteAction::Identical => label.blue().bold().to_string(),
        }
    }
}

/// Delegates discovery and generation to a [`TemplateEngine`] and reports results.
pub struct WorkflowManager {
    context: Arc<Context>,
    engine: Box<dyn TemplateEngine>,
    validator: Validator,
    writer: ContentWriter,
    styler: Styler,
    out: Box<dyn Write + Send>,
}

impl WorkflowManager {
    pub fn new(
        context: Arc<Context>,
        engine: Box<dyn TemplateEngine>,
        validator: Validator,
    ) -> Self {
        let styler = Styler {
            enabled: context.enable_colors,
        };
        WorkflowManager {
            context,
            engine,
            validator,
            writer: ContentWriter::new(),
            styler,
            out: Box::new(std::io::stdout()),
        }
    }

    /// Send report output somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn observable_sources(&self) -> Vec<PathBuf> {
        self.engine.observable_sources()
    }

    pub fn generator_manifest(&self, vars: &TemplateVars) -> GeneratorManifest {
        self.engine.generator_manifest(vars)
    }

    pub async fn workflow_definitions(&self) -> Result<Vec<Definition>, AppError> {
        self.engine.workflow_definitions().await
    }

    /// Check every definition, printing one summary line per workflow.
    ///
    /// Failures are collected; only resolver, reader and schema loading errors abort.
    pub async fn validate(&mut self, show_diffs: bool) -> Result<CheckSummary, AppError> {
        let definitions = self.engine.workflow_definitions().await?;
        let mut summary = CheckSummary::default();

        for definition in &definitions {
            let mut errors = Vec::new();
            let mut notes = Vec::new();
            let mut diff = None;

            if definition.status.valid {
                let schema = self.validator.validate_schema(definition).await?;
                collect(&schema, "schema", &mut errors, &mut notes);
                let content = self.validator.validate_content(definition)?;
                collect(&content, "content", &mut errors, &mut notes);
                if show_diffs {
                    if let Some(actual) = &content.actual_content {
                        diff = Some(render_diff(
                            actual,
                            &definition.content,
                            &self.context.display_path(&definition.destination),
                            self.styler,
                        ));
                    }
                }
            } else {
                errors.extend(definition.status.errors.iter().cloned());
            }

            summary.checked += 1;
            let line = format!("checking {} ... ", definition.name);
            if errors.is_empty() {
                let suffix = if notes.is_empty() {
                    String::new()
                } else {
                    format!(" {}", self.styler.dim(&format!("({})", notes.join(", "))))
                };
                writeln!(self.out, "{}{}{}", line, self.styler.ok("OK"), suffix)?;
            } else {
                writeln!(self.out, "{}{}", line, self.styler.failed("FAILED"))?;
                for error in &errors {
                    write_indented(&mut self.out, error)?;
                }
                if let Some(diff) = diff {
                    write!(self.out, "{}", diff)?;
                }
                summary.failed.push(definition.name.clone());
            }
        }

        if definitions.is_empty() {
            writeln!(
                self.out,
                "no workflows found in {}",
                self.context.display_path(&self.context.dir)
            )?;
        }
        tracing::info!(
            checked = summary.checked,
            failed = summary.failed.len(),
            "check complete"
        );
        Ok(summary)
    }

    /// Regenerate and write every definition whose generation and schema checks pass.
    pub async fn update(&mut self) -> Result<UpdateSummary, AppError> {
        let definitions = self.engine.workflow_definitions().await?;
        let mut summary = UpdateSummary::default();

        for definition in &definitions {
            let errors = if definition.status.valid {
                self.validator.validate_schema(definition).await?.errors
            } else {
                definition.status.errors.clone()
            };
            if !errors.is_empty() {
                writeln!(
                    self.out,
                    "{} {}",
                    self.styler.failed(&format!("{:>9}", "error")),
                    definition.name
                )?;
                for error in &errors {
                    write_indented(&mut self.out, error)?;
                }
                summary.failed.push(definition.name.clone());
                continue;
            }

            let outcome = self
                .writer
                .write(&definition.destination, definition.content.as_bytes())?;
            writeln!(
                self.out,
                "{} {}",
                self.styler.action(outcome.action),
                self.context.display_path(&outcome.path)
            )?;
            summary.written.push(outcome);
        }

        tracing::info!(
            written = summary.written.len(),
            changed = summary.changed(),
            failed = summary.failed.len(),
            "update complete"
        );
        Ok(summary)
    }

    /// Import every generated workflow in the output directory into template source.
    pub async fn import(&mut self) -> Result<Vec<PathBuf>, AppError> {
        let output_dir = self.context.output_dir();
        let mut imported = Vec::new();
        for existing in workflow_files(&output_dir)? {
            let path = self.engine.import_workflow(&existing).await?;
            writeln!(
                self.out,
                "{} {} -> {}",
                self.styler.ok(&format!("{:>9}", "imported")),
                self.context.display_path(&existing),
                self.context.display_path(&path)
            )?;
            imported.push(path);
        }

        if imported.is_empty() {
            writeln!(
                self.out,
                "no workflows found in {}",
                self.context.display_path(&output_dir)
            )?;
        } else {
            writeln!(
                self.out,
                "imported {} workflow(s); run gflows update to regenerate them",
                imported.len()
            )?;
        }
        Ok(imported)
    }

    /// Print a table of workflows, their sources and destinations and drift status.
    pub async fn list(&mut self) -> Result<(), AppError> {
        let definitions = self.engine.workflow_definitions().await?;
        let mut rows = vec![[
            "NAME".to_string(),
            "SOURCE".to_string(),
            "TARGET".to_string(),
            "STATUS".to_string(),
        ]];
        for definition in &definitions {
            let status = if definition.status.valid {
                content_status(&self.validator.validate_content(definition)?)
            } else {
                "invalid"
            };
            rows.push([
                definition.name.clone(),
                definition.source.clone(),
                self.context.display_path(&definition.destination),
                status.to_string(),
            ]);
        }

        let mut widths = [0usize; 3];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }
        for row in &rows {
            writeln!(
                self.out,
                "{:<w0$}  {:<w1$}  {:<w2$}  {}",
                row[0],
                row[1],
                row[2],
                row[3],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2]
            )?;
        }
        Ok(())
    }
}

fn collect(
    result: &ValidationResult,
    check: &str,
    errors: &mut Vec<String>,
    notes: &mut Vec<String>,
) {
    if result.is_skipped() {
        notes.push(format!("{} check skipped", check));
    }
    errors.extend(result.errors.iter().cloned());
}

fn content_status(result: &ValidationResult) -> &'static str {
    if result.is_skipped() {
        "unchecked"
    } else if result.actual_content.is_some() {
        "out of date"
    } else if !result.valid {
        "missing"
    } else {
        "up to date"
    }
}

fn write_indented(out: &mut Box<dyn Write + Send>, text: &str) -> std::io::Result<()> {
    for line in text.lines() {
        writeln!(out, "  {}", line)?;
    }
    Ok(())
}

/// Generated `*.yml` / `*.yaml` files directly inside `dir`, sorted.
fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| AppError::io("list", dir, e))? {
        let path = entry.map_err(|e| AppError::io("list", dir, e))?.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn styled_line(sign: char, text: &str, colors: bool) -> String {
    let line = format!("{}{}", sign, text);
    match (sign, colors) {
        ('-', true) => line.red().to_string(),
        ('+', true) => line.green().to_string(),
        _ => line,
    }
}

/// Unified diff from the committed file to the freshly generated content.
fn render_diff(actual: &str, expected: &str, path: &str, styler: Styler) -> String {
    let diff = TextDiff::from_lines(actual, expected);
    let mut output = String::new();
    output.push_str(&styler.dim(&format!("  --- {} (committed)\n", path)));
    output.push_str(&styler.dim(&format!("  +++ {} (generated)\n", path)));

    for group in diff.grouped_ops(3) {
        for op in group {
            for change in diff.iter_changes(&op) {
                let text = change.value().trim_end_matches('\n');
                let line = match change.tag() {
                    ChangeTag::Delete => styled_line('-', text, styler.enabled),
                    ChangeTag::Insert => styled_line('+', text, styler.enabled),
                    ChangeTag::Equal => format!(" {}", text),
                };
                output.push_str("  ");
                output.push_str(&line);
                output.push('\n');
            }
        }
    }
    output
}
