use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format. Object `data` is
/// merged into the JSON response; in text mode its fields are listed.
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

/// Output a structured value: pretty JSON, or flattened `a.b = value` lines in text mode
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => {
            let mut lines = Vec::new();
            flatten("", value, &mut lines);
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn flatten(prefix: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, lines);
            }
        }
        Value::String(s) => lines.push(format!("{} = {}", prefix, s)),
        other => lines.push(format!("{} = {}", prefix, other)),
    }
}
