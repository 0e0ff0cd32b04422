use clap::Parser;
use gflows::cli::{self, Args};
use gflows::core::{colors_enabled, AppError, ConfigLoader};
use gflows::logging::{self, LoggingOptions};
use std::process::ExitCode;

/// Exit code for configuration, I/O and network failures.
const FATAL_EXIT_CODE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = ConfigLoader::resolve_path(args.global.config.as_deref());
    let logging_options = LoggingOptions {
        config_dir: config_path.parent().map(|dir| dir.to_path_buf()),
        verbose: args.global.verbose,
        enable_colors: colors_enabled(args.global.disable_colors),
    };
    if let Err(e) = logging::init(&logging_options) {
        eprintln!("error: {:#}", e);
        return ExitCode::from(FATAL_EXIT_CODE);
    }

    match cli::run(args).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            report_fatal(&e);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn report_fatal(error: &anyhow::Error) {
    match error.downcast_ref::<AppError>() {
        Some(app_error) => {
            eprintln!("error: {}", app_error);
            for (key, value) in &app_error.context {
                eprintln!("  {}: {}", key, value);
            }
            tracing::debug!(
                category = %app_error.category,
                severity = ?app_error.severity(),
                code = %app_error.code,
                "command failed"
            );
        }
        None => eprintln!("error: {:#}", error),
    }
}
