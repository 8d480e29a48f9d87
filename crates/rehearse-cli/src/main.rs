//! Rehearse CLI - practice interview answers from the terminal
//!
//! Every screen of the app is a subcommand; protected ones run the route
//! guard before doing anything.

mod auth;
mod cli;
mod commands;
mod device;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::{run_forgot_password, run_login, run_logout, run_signup, run_whoami};
use crate::commands::common::load_config;
use crate::commands::completions::run_completions;
use crate::commands::diagnostics::{run_diagnostics, run_setup};
use crate::commands::history::run_history;
use crate::commands::landing::run_landing;
use crate::commands::practice::run_practice;
use crate::commands::tailor::run_tailor;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "rehearse=info"
            .parse()
            .map_err(|error| CliError::InvalidArgument(format!("invalid log filter: {error}")))?,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => run_landing(&config).await,
        Some(Commands::Login(credentials)) => run_login(&config, credentials).await,
        Some(Commands::Signup { credentials, name }) => {
            run_signup(&config, credentials, &name).await
        }
        Some(Commands::ForgotPassword { email }) => run_forgot_password(&config, &email).await,
        Some(Commands::Logout) => run_logout(&config).await,
        Some(Commands::Whoami) => run_whoami(&config).await,
        Some(Commands::Practice(args)) => run_practice(&config, args).await,
        Some(Commands::History { command }) => run_history(&config, command).await,
        Some(Commands::Tailor(args)) => run_tailor(&config, args).await,
        Some(Commands::Diagnostics { json }) => run_diagnostics(&config, json).await,
        Some(Commands::Setup) => run_setup(&config).await,
        Some(Commands::Completions { .. }) => Ok(()),
    }
}
