use grove_forest::{ForestConfig, Script, read_script_from_path};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber on stderr. `--log` wins over `RUST_LOG`.
pub fn init_tracing(log: Option<&str>) {
    let filter = match log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_script_or_exit(path: &str) -> Script {
    read_script_from_path(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read script {path}: {e}");
        std::process::exit(1);
    })
}

pub fn load_config_or_exit(path: Option<&str>) -> ForestConfig {
    let Some(path) = path else {
        return ForestConfig::default();
    };
    ForestConfig::load(path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn print_json_or_exit<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render JSON: {e}");
            std::process::exit(1);
        }
    }
}
