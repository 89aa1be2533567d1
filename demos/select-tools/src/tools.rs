//! Built-in implementations bound to the sample catalog.

use anyhow::Result;
use serde_json::{Value, json};
use toolbelt::prelude::{ContractedTool, InputContract, Tool, ToolError, ToolResult};

/// Applies `op` to `a` and `b`.
pub fn calc() -> Result<impl Tool> {
    let contract = InputContract::from_json_schema(&json!({
        "type": "object",
        "properties": {
            "a": { "type": "number" },
            "b": { "type": "number" },
            "op": { "enum": ["add", "sub", "mul", "div"] }
        },
        "required": ["a", "b", "op"],
        "additionalProperties": false
    }))?;
    Ok(ContractedTool::new(evaluate, contract))
}

async fn evaluate(input: Value) -> ToolResult<Value> {
    let a = input["a"].as_f64().unwrap_or_default();
    let b = input["b"].as_f64().unwrap_or_default();
    let result = match input["op"].as_str() {
        Some("add") => a + b,
        Some("sub") => a - b,
        Some("mul") => a * b,
        Some("div") if b == 0.0 => return Err(ToolError::execution("division by zero")),
        Some("div") => a / b,
        other => return Err(ToolError::execution(format!("unsupported operation {other:?}"))),
    };
    Ok(json!({ "result": result }))
}

/// Returns its input.
pub async fn echo(input: Value) -> ToolResult<Value> {
    Ok(input)
}

/// Reports the current UTC time.
pub async fn clock(_input: Value) -> ToolResult<Value> {
    Ok(json!({ "utc": chrono::Utc::now().to_rfc3339() }))
}
