//! Argument checking against a tool's declared parameter schema
//!
//! The schema is compiled and checked with `jsonschema`. Afterwards any
//! property the caller left out picks up its declared `default`.

use serde_json::Value;

use super::ToolArguments;

/// Validate `arguments` and return them with schema defaults filled in.
/// Every violation is reported, joined with `, `.
pub fn validate_arguments(schema: &Value, arguments: &ToolArguments) -> Result<ToolArguments, String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("invalid tool schema: {}", e))?;

    let instance = Value::Object(arguments.clone());
    let errors: Vec<String> = validator.iter_errors(&instance).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(errors.join(", "));
    }

    Ok(fill_defaults(schema, arguments))
}

fn fill_defaults(schema: &Value, arguments: &ToolArguments) -> ToolArguments {
    let mut filled = arguments.clone();
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            if filled.contains_key(name) {
                continue;
            }
            if let Some(default) = prop.get("default") {
                filled.insert(name.clone(), default.clone());
            }
        }
    }
    filled
}
