//! `foo`: a fixed-answer demo tool.

use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;
use tracing::debug;

pub const FOO_ANSWER: &str = "the value of foo is \"This is a demo\"";

pub struct FooTool;

#[async_trait]
impl Tool for FooTool {
    fn name(&self) -> &str {
        "foo"
    }

    fn description(&self) -> &str {
        "returns the answer to what foo is"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string" }
            }
        })
    }

    async fn invoke(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        debug!("foo invoked");
        Ok(FOO_ANSWER.to_string())
    }
}
