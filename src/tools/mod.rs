//! Callable tools the model can invoke mid-conversation
//!
//! A [`Tool`] advertises a name, a description and a JSON-Schema-like
//! parameter object; the [`ToolRegistry`] owns tools and dispatches calls by
//! name after checking the arguments against the declared schema.

pub mod builtin;
pub mod calc;
pub mod validate;

pub use builtin::{default_registry, Calculate, CheckTransactionStatus, GetWeather};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ColloquyError, ColloquyResult};

/// Arguments passed to a tool, keyed by parameter name
pub type ToolArguments = Map<String, Value>;

/// A named, schema-described action
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-Schema object describing the accepted arguments
    fn parameters(&self) -> Value;

    /// Run the tool. Arguments have already been validated against
    /// [`Tool::parameters`] with schema defaults filled in.
    async fn execute(&self, arguments: &ToolArguments) -> anyhow::Result<Value>;

    fn schema(&self) -> ToolSchema {
        ToolSchema::function(self.name(), self.description(), self.parameters())
    }
}

/// Declarative schema exposed to the model:
/// `{type: "function", function: {name, description, parameters}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSchema {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Name-keyed collection of tools. Registration order is kept and is the
/// order schemas are reported in.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any existing tool with the same name in place
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    /// Remove a tool. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.tools.len();
        self.tools.retain(|t| t.name() != name);
        self.tools.len() != before
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn list(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas in registry order, optionally limited to an allow-list.
    /// Unknown names in the allow-list are ignored.
    pub fn schemas(&self, allow: Option<&[String]>) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|t| allow.map_or(true, |names| names.iter().any(|n| n == t.name())))
            .map(|t| t.schema())
            .collect()
    }

    /// Dispatch a call by name.
    ///
    /// Fails with `ToolNotFound` for unregistered names, `InvalidArguments`
    /// when the arguments do not fit the schema, and `ToolExecution` when the
    /// tool's own action fails.
    pub async fn execute(&self, name: &str, arguments: &ToolArguments) -> ColloquyResult<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ColloquyError::ToolNotFound(name.to_string()))?;

        let arguments = validate::validate_arguments(&tool.parameters(), arguments).map_err(|reason| {
            ColloquyError::InvalidArguments {
                tool: name.to_string(),
                reason,
            }
        })?;

        tool.execute(&arguments)
            .await
            .map_err(|e| ColloquyError::ToolExecution {
                tool: name.to_string(),
                message: format!("{:#}", e),
            })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
