mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use homematic_core::Ccu;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "hmctl", &mut std::io::stdout());
            Ok(())
        }

        // All other commands talk to the CCU
        cmd => {
            let file_config = homematic_config::load_config()?;
            let mut ccu_config = config::resolve_ccu_config(&cli.global, &file_config)?;
            if let Command::Listen(ref args) = cmd {
                if let Some(bind) = args.bind {
                    ccu_config.callback_bind = bind;
                }
            }
            let ccu = Ccu::new(ccu_config)?;

            tracing::debug!(command = ?cmd, host = %ccu.config().host, "dispatching command");
            commands::dispatch(cmd, &ccu, &cli.global).await
        }
    }
}
