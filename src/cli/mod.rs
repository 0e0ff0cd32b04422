pub mod args;
pub mod commands;
pub mod init;
pub mod watch;

pub use args::{CheckArgs, GlobalArgs, InitArgs, UpdateArgs, WatchArgs};
pub use commands::RunStatus;
use crate::core::ConfigLoader;
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n\
{after-help}";

fn long_help() -> String {
    let mut help = String::from(
        "Typical flow: gflows init, edit templates under .gflows/workflows, \
         gflows update, then gflows check in CI.\n\nENVIRONMENT:\n",
    );
    for line in ConfigLoader::env_var_documentation() {
        help.push_str("    ");
        help.push_str(line);
        help.push('\n');
    }
    help
}

#[derive(Parser, Debug)]
#[command(name = "gflows")]
#[command(version = crate::VERSION)]
#[command(about = "Generate, validate and import GitHub workflows from templates")]
#[command(help_template = HELP_TEMPLATE)]
#[command(after_long_help = long_help())]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Scaffold a gflows project",
        long_about = "Init writes a config file, an example workflow template and a shared library for the chosen engine.",
        after_help = "Example:\n    gflows init --engine ytt --workflow-name build"
    )]
    Init(InitArgs),
    #[command(
        about = "Check generated workflows are valid and up to date",
        long_about = "Check regenerates every workflow in memory, validates it against the workflow schema and compares it with the committed file. Exits non-zero when anything fails.",
        after_help = "Example:\n    gflows check --show-diffs"
    )]
    Check(CheckArgs),
    #[command(
        about = "Regenerate workflow files",
        long_about = "Update regenerates every workflow and writes the ones that compile and pass schema validation.",
        after_help = "Example:\n    gflows update"
    )]
    Update(UpdateArgs),
    #[command(
        about = "Import existing workflows as templates",
        long_about = "Import converts every workflow in the output directory into template source for the configured engine.",
        after_help = "Example:\n    gflows import"
    )]
    Import,
    #[command(
        about = "List workflows and their status",
        after_help = "Example:\n    gflows ls"
    )]
    Ls,
    #[command(
        about = "Watch template sources and re-run checks",
        after_help = "Example:\n    gflows watch --show-diffs"
    )]
    Watch(WatchArgs),
}

pub async fn run(args: Args) -> crate::Result<RunStatus> {
    let global = args.global;
    match args.command {
        Command::Init(init_args) => init::run(&global, init_args).await,
        Command::Check(check_args) => commands::check(&global, check_args).await,
        Command::Update(update_args) => commands::update(&global, update_args).await,
        Command::Import => commands::import(&global).await,
        Command::Ls => commands::ls(&global).await,
        Command::Watch(watch_args) => {
            let check_args = CheckArgs {
                show_diffs: watch_args.show_diffs,
                watch: true,
            };
            commands::check(&global, check_args).await
        }
    }
}
