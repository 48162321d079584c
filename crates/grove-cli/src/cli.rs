use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "grove",
    about = "Grove: replay operation scripts against an in-process versioned graph",
    version
)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `grove_forest=trace` (defaults to RUST_LOG, then `warn`)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSONL operation script and report net values
    Replay {
        /// Path to the script (one operation per line)
        script: String,

        /// Forest config (TOML)
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a script without applying it
    Check {
        /// Path to the script
        script: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
