use crate::support::{load_script_or_exit, print_json_or_exit};
use grove_forest::{Script, ScriptOp};
use serde_json::json;
use std::collections::BTreeMap;

/// Operation counts by name, descending into transaction bodies.
fn op_counts(script: &Script) -> BTreeMap<&'static str, usize> {
    fn tally(op: &ScriptOp, counts: &mut BTreeMap<&'static str, usize>) {
        *counts.entry(op.name()).or_default() += 1;
        if let ScriptOp::Transaction { ops, .. } = op {
            for inner in ops {
                tally(inner, counts);
            }
        }
    }

    let mut counts = BTreeMap::new();
    for line in &script.lines {
        tally(&line.op, &mut counts);
    }
    counts
}

pub fn run(script: String, json_output: bool) {
    let parsed = load_script_or_exit(&script);
    let counts = op_counts(&parsed);

    if json_output {
        print_json_or_exit(&json!({
            "script": script,
            "lines": parsed.lines.len(),
            "ops": counts,
        }));
    } else {
        println!("grove check {script}");
        println!("  Lines: {}", parsed.lines.len());
        for (op, count) in &counts {
            println!("    {op}: {count}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_forest::read_script;

    #[test]
    fn counts_nested_operations() {
        let text = concat!(
            "{\"op\": \"add_node\", \"id\": \"a\", \"value\": 1}\n",
            "{\"op\": \"transaction\", \"ops\": [",
            "{\"op\": \"update\", \"node\": \"a\", \"value\": 2},",
            "{\"op\": \"update\", \"node\": \"a\", \"value\": 3}]}\n",
        );
        let script = read_script(text.as_bytes()).expect("script");
        let counts = op_counts(&script);
        assert_eq!(counts.get("add_node"), Some(&1));
        assert_eq!(counts.get("transaction"), Some(&1));
        assert_eq!(counts.get("update"), Some(&2));
    }
}
