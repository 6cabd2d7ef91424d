//! Normalising engine statistics for delivery.

use serde_json::Value;

/// Trim statistics down to what callers need.
///
/// Unless full stats were requested, per-module detail is dropped: the
/// top-level `modules` list, every chunk's `modules`, and the same inside
/// nested `children` (one entry per configuration of a multi-config build).
pub fn normalize_stats(mut stats: Value, full_stats: bool) -> Value {
    if !full_stats {
        strip_modules(&mut stats);
    }
    stats
}

fn strip_modules(stats: &mut Value) {
    let Some(obj) = stats.as_object_mut() else {
        return;
    };

    obj.remove("modules");

    if let Some(chunks) = obj.get_mut("chunks").and_then(Value::as_array_mut) {
        for chunk in chunks {
            if let Some(chunk) = chunk.as_object_mut() {
                chunk.remove("modules");
            }
        }
    }

    if let Some(children) = obj.get_mut("children").and_then(Value::as_array_mut) {
        for child in children {
            strip_modules(child);
        }
    }
}

/// Compile errors recorded in statistics, flattened to messages.
///
/// Engines report errors either as strings or as objects with a `message`
/// (and sometimes a `stack`).
pub fn compile_errors(stats: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    collect_errors(stats, &mut errors);
    errors
}

fn collect_errors(stats: &Value, out: &mut Vec<String>) {
    if let Some(list) = stats.get("errors").and_then(Value::as_array) {
        for err in list {
            match err {
                Value::String(message) => out.push(message.clone()),
                Value::Object(fields) => {
                    let message = fields.get("message").and_then(Value::as_str);
                    let stack = fields.get("stack").and_then(Value::as_str);
                    match (message, stack) {
                        (Some(m), Some(s)) => out.push(format!("{m}\n\n{s}")),
                        (Some(m), None) => out.push(m.to_string()),
                        (None, Some(s)) => out.push(s.to_string()),
                        (None, None) => out.push(err.to_string()),
                    }
                }
                other => out.push(other.to_string()),
            }
        }
    }

    if let Some(children) = stats.get("children").and_then(Value::as_array) {
        for child in children {
            collect_errors(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "hash": "70e51300713754ab4a9a",
            "errors": [],
            "warnings": [],
            "assets": [{ "name": "main-70e513.js", "size": 120 }],
            "modules": [{ "name": "./index.js", "source": "console.log(1)" }],
            "chunks": [{ "id": 0, "files": ["main-70e513.js"], "modules": [{ "name": "./index.js" }] }],
            "children": [{ "modules": [{ "name": "./worker.js" }], "errors": [] }]
        })
    }

    #[test]
    fn strips_module_detail_by_default() {
        let stats = normalize_stats(sample(), false);
        assert!(stats.get("modules").is_none());
        assert!(stats["chunks"][0].get("modules").is_none());
        assert_eq!(stats["chunks"][0]["files"], json!(["main-70e513.js"]));
        assert!(stats["children"][0].get("modules").is_none());
        assert_eq!(stats["assets"][0]["name"], json!("main-70e513.js"));
    }

    #[test]
    fn full_stats_are_untouched() {
        assert_eq!(normalize_stats(sample(), true), sample());
    }

    #[test]
    fn compile_errors_from_strings_objects_and_children() {
        let stats = json!({
            "errors": [
                "Module not found: ./missing",
                { "message": "Unexpected token", "stack": "at parse (index.js:1)" }
            ],
            "children": [{ "errors": [{ "message": "child failed" }] }]
        });
        assert_eq!(
            compile_errors(&stats),
            vec![
                "Module not found: ./missing".to_string(),
                "Unexpected token\n\nat parse (index.js:1)".to_string(),
                "child failed".to_string(),
            ]
        );
    }

    #[test]
    fn no_errors_key_means_no_errors() {
        assert!(compile_errors(&json!({ "assets": [] })).is_empty());
        assert!(compile_errors(&sample()).is_empty());
    }
}
