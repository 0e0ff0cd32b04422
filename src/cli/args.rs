use clap::Args;
use std::path::PathBuf;

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Location of the gflows config file (default: .gflows/config.yml, or $GFLOWS_CONFIG)
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable colored output (also disabled when NO_COLOR is set)
    #[arg(long, global = true)]
    pub disable_colors: bool,

    /// Emit debug logs on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Template engine for the new project
    #[arg(long, default_value = "jsonnet", value_parser = ["jsonnet", "ytt"])]
    pub engine: String,

    /// Name of the example workflow to scaffold
    #[arg(long, default_value = "gflows", value_name = "NAME")]
    pub workflow_name: String,

    /// Directory receiving generated workflows
    #[arg(long, default_value = ".github", value_name = "DIR")]
    pub github_dir: String,

    /// Overwrite scaffold files that already exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Print a diff for every out of date workflow
    #[arg(long)]
    pub show_diffs: bool,

    /// Re-run the check whenever a template source changes
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Regenerate whenever a template source changes
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Print a diff for every out of date workflow
    #[arg(long)]
    pub show_diffs: bool,
}
