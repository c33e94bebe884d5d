//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are opaque capability providers: they advertise a name, a
//! description and a JSON Schema for their input, and turn a JSON argument
//! value into a string. They are untrusted, slow and fallible, so the
//! registry's [`ToolRegistry::execute`] is the boundary where every failure
//! mode becomes a plain [`ToolResult`] with `failed = true`.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ToolError;

/// The advertised shape of a capability, sent to the reasoning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique name within a registry
    pub name: String,

    /// What the tool does (shown to the reasoning engine)
    pub description: String,

    /// JSON Schema describing the tool's arguments
    pub input_schema: serde_json::Value,
}

/// A request from the reasoning engine to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation ID (matches the engine's tool_call.id when it has one)
    pub id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a call with a freshly generated ID.
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,

    /// Tool output, or a diagnostic when `failed` is set
    pub output: String,

    pub failed: bool,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            output: output.into(),
            failed: false,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            output: format!("Error: {error}"),
            failed: true,
        }
    }
}

/// The core Tool trait.
///
/// Each built-in capability (price lookup, search, calculator, ...)
/// implements this trait and is registered in a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the reasoning engine).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool.
    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// The catalog entry advertised for this tool.
    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

type InvokeFn =
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// A tool assembled from a name, description, schema and async closure.
///
/// ```
/// # use agentloop_core::tool::FnTool;
/// let foo = FnTool::new(
///     "foo",
///     "returns the answer to what foo is",
///     serde_json::json!({"type": "object"}),
///     |_args| async { Ok("the value of foo is \"This is a demo\"".to_string()) },
/// );
/// ```
pub struct FnTool {
    spec: ToolSpec,
    func: Arc<InvokeFn>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        func: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            spec: ToolSpec {
                name: name.into(),
                description: description.into(),
                input_schema,
            },
            func: Arc::new(move |args| func(args).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.spec.input_schema.clone()
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        (self.func)(arguments).await
    }
}

/// A catalog of available tools.
///
/// Built once, then shared behind an `Arc`; nothing mutates it while
/// requests are running, so the catalog a request sees is frozen.
/// Names are unique: a duplicate registration is rejected and the first
/// binding wins.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::from(tool));
        Ok(())
    }

    /// Register a tool whose backing resource may have failed to start.
    /// `None` leaves the catalog unchanged.
    pub fn register_optional(
        &mut self,
        name: &str,
        tool: Option<Box<dyn Tool>>,
    ) -> Result<(), ToolError> {
        match tool {
            Some(tool) => self.register(tool),
            None => {
                warn!(tool = name, "Capability unavailable, leaving it out of the catalog");
                Ok(())
            }
        }
    }

    /// Look up the invoker bound to `name`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Catalog snapshot in registration order.
    pub fn list(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.to_spec()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call. Never fails: unknown tools, tool errors,
    /// timeouts and panics all come back as a failed [`ToolResult`].
    pub async fn execute(&self, call: &ToolCall, timeout: Duration) -> ToolResult {
        let Some(tool) = self.resolve(&call.tool_name) else {
            warn!(tool = %call.tool_name, "Requested tool is not in the catalog");
            return ToolResult::failure(
                &call.tool_name,
                &ToolError::NotFound(call.tool_name.clone()),
            );
        };

        debug!(tool = %call.tool_name, call_id = %call.id, "Invoking tool");
        let invocation = AssertUnwindSafe(tool.invoke(call.arguments.clone())).catch_unwind();

        let error = match tokio::time::timeout(timeout, invocation).await {
            Ok(Ok(Ok(output))) => return ToolResult::success(&call.tool_name, output),
            Ok(Ok(Err(e))) => e,
            Ok(Err(panic)) => ToolError::Panicked(panic_message(panic.as_ref())),
            Err(_) => ToolError::Timeout {
                tool_name: call.tool_name.clone(),
                timeout,
            },
        };

        warn!(tool = %call.tool_name, error = %error, "Tool invocation failed");
        ToolResult::failure(&call.tool_name, &error)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
