//! Tools the agent may call, looked up by name.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Value;

    async fn invoke(&self, args: Value) -> anyhow::Result<String>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in collection tools.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DebtLookupTool);
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Sorted by name so requests are stable.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Call a tool by name with raw JSON arguments as sent by the model.
    pub async fn invoke(&self, name: &str, raw_args: &str) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        let args: Value = if raw_args.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw_args).map_err(|e| AgentError::InvalidToolArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?
        };
        tool.invoke(args).await.map_err(|e| AgentError::ToolFailed {
            tool: name.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Looks up a customer's outstanding debt.
///
/// Backed by fixed data until a billing backend is wired in.
pub struct DebtLookupTool;

#[async_trait]
impl Tool for DebtLookupTool {
    fn name(&self) -> &str {
        "consultar_divida"
    }

    fn description(&self) -> &str {
        "Consulta o status de dívida de um cliente pelo ID."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "cliente_id": {
                    "type": "string",
                    "description": "ID do cliente"
                }
            },
            "required": ["cliente_id"]
        })
    }

    async fn invoke(&self, args: Value) -> anyhow::Result<String> {
        let cliente_id = match args.get("cliente_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => anyhow::bail!("Missing 'cliente_id' parameter"),
        };
        Ok(format!(
            "Cliente {cliente_id} tem dívida de R$ 500,00 vencida em 15/08/2024."
        ))
    }
}
