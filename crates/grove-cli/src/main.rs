//! Grove CLI: the `grove` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.log.as_deref());

    match cli.command {
        Commands::Replay {
            script,
            config,
            json,
        } => commands::replay::run(script, config, json),

        Commands::Check { script, json } => commands::check::run(script, json),
    }
}
