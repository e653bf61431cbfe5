//! gitmirror - replicate a path-filtered slice of one repository's history
//! into another

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libgitmirror_core::MirrorError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    if let Err(e) = run_command(&cli) {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_command(cli: &Cli) -> Result<(), MirrorError> {
    match &cli.command {
        Command::Init {
            folders,
            files,
            remote,
            force,
        } => commands::init::run(cli, folders, files, remote.clone(), *force),
        Command::Run { root } => commands::run::run(cli, root),
        Command::Plan { root } => commands::plan::run(cli, root),
        Command::Status => commands::status::run(cli),
    }
}
