use crate::cli::args::{GlobalArgs, InitArgs};
use crate::cli::commands::RunStatus;
use crate::core::config::{ConfigLoader, EngineKind, GflowsConfig};
use crate::core::engine::{create_engine, GeneratorManifest, TemplateVars};
use crate::core::{
    colors_enabled, ContentReader, ContentWriter, Context, DefaultContentReader, LibraryResolver,
    Validator, WorkflowManager,
};
use crate::Result;
use anyhow::anyhow;
use crossterm::style::Stylize;
use std::env;
use std::io::Write;
use std::sync::Arc;

/// Handles `gflows init` by writing the engine's scaffold next to the config path.
pub async fn run(global: &GlobalArgs, args: InitArgs) -> Result<RunStatus> {
    let engine: EngineKind = args.engine.parse()?;
    let config_path = ConfigLoader::resolve_path(global.config.as_deref());
    if config_path.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists; use --force to overwrite the scaffold",
            config_path.display()
        ));
    }

    let mut config = GflowsConfig {
        github_dir: args.github_dir.clone(),
        ..GflowsConfig::default()
    };
    config.templates.engine = Some(engine.to_string());

    let base_dir = env::current_dir()?;
    let context = Arc::new(Context::from_config(
        base_dir,
        config_path,
        config,
        colors_enabled(global.disable_colors),
    )?);

    let manager = scaffold_manager(Arc::clone(&context));
    let mut manifest = manager.generator_manifest(&TemplateVars {
        workflow_name: args.workflow_name.clone(),
        github_dir: args.github_dir.clone(),
    });
    // the config scaffold always lands at the requested config path
    for entry in manifest.entries.iter_mut().filter(|e| e.source == "config.yml") {
        entry.destination = context.config_path.clone();
    }

    write_manifest(&context, &manifest, args.force, &mut std::io::stdout())?;
    println!(
        "Initialized gflows ({}) in {}",
        context.engine,
        context.display_path(&context.dir)
    );
    println!("Run: gflows update");
    Ok(RunStatus::Success)
}

/// Manager for a project that does not exist yet; nothing is resolved or fetched.
fn scaffold_manager(context: Arc<Context>) -> WorkflowManager {
    let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
    let resolver = Arc::new(LibraryResolver::new(Arc::clone(&reader)));
    let engine = create_engine(Arc::clone(&context), resolver, None);
    let validator = Validator::lazy(Arc::clone(&context), reader);
    WorkflowManager::new(context, engine, validator)
}

/// Write every scaffold file, leaving existing files alone unless `force` is set.
pub fn write_manifest(
    context: &Context,
    manifest: &GeneratorManifest,
    force: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let writer = ContentWriter::new();
    for entry in &manifest.entries {
        let display = context.display_path(&entry.destination);
        if entry.destination.exists() && !force {
            let label = format!("{:>9}", "exists");
            if context.enable_colors {
                writeln!(out, "{} {}", label.dark_grey(), display)?;
            } else {
                writeln!(out, "{} {}", label, display)?;
            }
            continue;
        }
        let outcome = writer.write(&entry.destination, entry.content.as_bytes())?;
        let path = &display;
        tracing::debug!(source = entry.source, path = %path, "wrote scaffold file");
        let label = format!("{:>9}", outcome.action.to_string());
        if context.enable_colors {
            writeln!(out, "{} {}", label.green().bold(), display)?;
        } else {
            writeln!(out, "{} {}", label, display)?;
        }
    }
    Ok(())
}
