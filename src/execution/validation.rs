//! Output validation run when a node reaches 100%.

use serde_json::Value;

use crate::types::PipelineNode;

/// JavaScript-style truthiness: `null`, `false`, `0`, `NaN` and `""` are
/// falsy; every array and object is truthy.
pub fn is_truthy(v: &Value) -> bool {
  match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Checks the node's output against its kind's requirement. Kinds without a
/// requirement always pass.
pub fn validate_output(node: &PipelineNode) -> Result<(), String> {
  let Some(req) = node.kind().output_requirement() else {
    return Ok(());
  };
  let present = node
    .data
    .output
    .as_ref()
    .and_then(|o| o.get(req.field))
    .is_some_and(is_truthy);
  if present {
    Ok(())
  } else {
    Err(req.message.to_string())
  }
}
