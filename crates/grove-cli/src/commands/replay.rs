use crate::support::{load_config_or_exit, load_script_or_exit, print_json_or_exit};
use grove_forest::{Forest, replay};
use serde_json::json;
use tracing::info;

pub fn run(script: String, config: Option<String>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let parsed = load_script_or_exit(&script);

    let mut forest = Forest::with_config(config);
    let report = replay(&mut forest, &parsed);
    info!(
        forest = %forest.config().name,
        applied = report.applied,
        failed = report.failures.len(),
        "replay finished"
    );

    if json_output {
        print_json_or_exit(&json!({
            "script": script,
            "forest": forest.config().name,
            "clock": forest.now().get(),
            "applied": report.applied,
            "failures": report.failures,
            "values": report.values,
        }));
    } else {
        println!("grove replay {script}");
        println!("  Forest: {}", forest.config().name);
        println!("  Applied: {}", report.applied);
        println!("  Failed: {}", report.failures.len());
        for failure in &report.failures {
            println!("    line {} ({}): {}", failure.line, failure.op, failure.error);
        }
        if !report.values.is_empty() {
            println!("  Values:");
            for (alias, value) in &report.values {
                println!("    {alias} = {}", value.to_json());
            }
        }
    }

    if !report.failures.is_empty() {
        std::process::exit(1);
    }
}
