use crate::cli::args::{CheckArgs, GlobalArgs, UpdateArgs};
use crate::cli::watch::FileWatcher;
use crate::core::{
    create_engine, Context, ContextOptions, ContentReader, DefaultContentReader, LibraryResolver,
    Validator, WorkflowManager,
};
use crate::Result;
use std::process::ExitCode;
use std::sync::Arc;

/// Outcome of a command that completed without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every workflow generated and validated.
    Success,
    /// At least one workflow failed generation, schema or content checks.
    Failed,
}

impl RunStatus {
    pub fn from_valid(valid: bool) -> Self {
        if valid {
            RunStatus::Success
        } else {
            RunStatus::Failed
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Failed => ExitCode::from(1),
        }
    }
}

/// When a session fetches the default workflow schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLoading {
    /// Before any workflow is generated, so a bad schema fails fast.
    Upfront,
    /// On the first schema check; commands without schema checks never fetch it.
    OnDemand,
}

/// Everything one command needs, built from the global flags.
pub struct Session {
    pub context: Arc<Context>,
    pub resolver: Arc<LibraryResolver>,
    pub manager: WorkflowManager,
}

impl Session {
    pub async fn open(global: &GlobalArgs, schema: SchemaLoading) -> Result<Self> {
        let context = Arc::new(Context::load(&ContextOptions {
            config_path: global.config.clone(),
            disable_colors: global.disable_colors,
        })?);
        tracing::debug!(
            config = %context.config_path.display(),
            engine = %context.engine,
            "loaded context"
        );

        let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
        let resolver = Arc::new(LibraryResolver::new(Arc::clone(&reader)));
        let engine = create_engine(Arc::clone(&context), Arc::clone(&resolver), None);
        let validator = match schema {
            SchemaLoading::Upfront => Validator::new(Arc::clone(&context), reader).await?,
            SchemaLoading::OnDemand => Validator::lazy(Arc::clone(&context), reader),
        };
        let manager = WorkflowManager::new(Arc::clone(&context), engine, validator);

        Ok(Session {
            context,
            resolver,
            manager,
        })
    }

    /// Remove materialized libraries; runs after every command, failed or not.
    pub async fn close(self) -> Result<()> {
        self.resolver.cleanup().await?;
        Ok(())
    }

    /// Clean up, then hand back the command's own result.
    async fn finish(self, result: Result<RunStatus>) -> Result<RunStatus> {
        let cleanup = self.close().await;
        let status = result?;
        cleanup?;
        Ok(status)
    }
}

/// What a watch loop re-runs after each batch of changes.
#[derive(Debug, Clone, Copy)]
enum WatchAction {
    Check { show_diffs: bool },
    Update,
}

pub async fn check(global: &GlobalArgs, args: CheckArgs) -> Result<RunStatus> {
    let mut session = Session::open(global, SchemaLoading::Upfront).await?;
    let result = run_check(&mut session, &args).await;
    session.finish(result).await
}

async fn run_check(session: &mut Session, args: &CheckArgs) -> Result<RunStatus> {
    let summary = session.manager.validate(args.show_diffs).await?;
    if args.watch {
        let action = WatchAction::Check {
            show_diffs: args.show_diffs,
        };
        watch_loop(session, action).await?;
    }
    Ok(RunStatus::from_valid(summary.is_valid()))
}

pub async fn update(global: &GlobalArgs, args: UpdateArgs) -> Result<RunStatus> {
    let mut session = Session::open(global, SchemaLoading::Upfront).await?;
    let result = run_update(&mut session, &args).await;
    session.finish(result).await
}

async fn run_update(session: &mut Session, args: &UpdateArgs) -> Result<RunStatus> {
    let summary = session.manager.update().await?;
    if args.watch {
        watch_loop(session, WatchAction::Update).await?;
    }
    Ok(RunStatus::from_valid(summary.is_valid()))
}

pub async fn import(global: &GlobalArgs) -> Result<RunStatus> {
    let mut session = Session::open(global, SchemaLoading::OnDemand).await?;
    let result = session
        .manager
        .import()
        .await
        .map(|_| RunStatus::Success)
        .map_err(Into::into);
    session.finish(result).await
}

pub async fn ls(global: &GlobalArgs) -> Result<RunStatus> {
    let mut session = Session::open(global, SchemaLoading::OnDemand).await?;
    let result = session
        .manager
        .list()
        .await
        .map(|_| RunStatus::Success)
        .map_err(Into::into);
    session.finish(result).await
}

/// Re-run `action` after every batch of source changes until interrupted.
async fn watch_loop(session: &mut Session, action: WatchAction) -> Result<()> {
    let sources = session.manager.observable_sources();
    let mut watcher = FileWatcher::new(&session.context.dir, &sources)?;
    println!(
        "watching {} for changes, press Ctrl-C to stop",
        watcher.describe(&session.context)
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("watch interrupted");
                return Ok(());
            }
            changed = watcher.next_change() => {
                let Some(changed) = changed else {
                    return Ok(());
                };
                tracing::info!(files = changed.len(), "sources changed");
                let result = match action {
                    WatchAction::Check { show_diffs } => {
                        session.manager.validate(show_diffs).await.map(|_| ())
                    }
                    WatchAction::Update => session.manager.update().await.map(|_| ()),
                };
                if let Err(e) = result {
                    eprintln!("error: {}", e);
                }
            }
        }
    }
}
