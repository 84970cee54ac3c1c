//! Echo tool: returns its input.

use async_trait::async_trait;
use serde_json::Value;

use crate::invocation::{Arguments, ExecutionContext, ToolOutput};
use crate::relay::ProgressRelay;
use crate::tools::error::ToolError;
use crate::tools::tool::Tool;

/// Returns the `text` argument verbatim, or the whole argument map as JSON.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the `text` argument, or all arguments as JSON when `text` is absent."
    }

    async fn execute(
        &self,
        arguments: &Arguments,
        _ctx: &ExecutionContext,
        _progress: Option<&ProgressRelay>,
    ) -> Result<ToolOutput, ToolError> {
        match arguments.get("text") {
            Some(Value::String(text)) => Ok(ToolOutput::Text(text.clone())),
            Some(other) => Err(ToolError::InvalidArguments(format!(
                "'text' must be a string, got {other}"
            ))),
            None => Ok(ToolOutput::Json(Value::Object(arguments.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn echoes_text_argument() {
        let output = EchoTool
            .execute(&args(json!({"text": "hi"})), &ExecutionContext::default(), None)
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn echoes_all_arguments_as_json() {
        let output = EchoTool
            .execute(&args(json!({"b": 2, "a": 1})), &ExecutionContext::default(), None)
            .await
            .unwrap();
        assert_eq!(output.to_wire().unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[tokio::test]
    async fn rejects_non_string_text() {
        let err = EchoTool
            .execute(&args(json!({"text": 5})), &ExecutionContext::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
