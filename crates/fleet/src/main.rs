mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

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
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "fleet", &mut std::io::stdout());
            Ok(())
        }

        Command::Sites(args) => {
            let config = load_config(&cli.global)?;
            tracing::debug!(sites = config.sites.len(), "configuration loaded");
            commands::sites::handle(args, &config, &cli.global).await
        }
    }
}

fn load_config(global: &GlobalOpts) -> Result<fleet_config::Config, CliError> {
    let config = match &global.config {
        Some(path) => fleet_config::load_config_from(path)?,
        None => fleet_config::load_config()?,
    };
    Ok(config)
}
