//! Host tool registry.
//!
//! The generator only needs [`ToolRegistry::register`]. A host exposes the
//! registered tools over whatever protocol it speaks;
//! [`InMemoryToolRegistry`] is a minimal in-process host.

use std::sync::Arc;

use serde_json::Value;

use crate::error::RegistryError;
use crate::tool::{Tool, ToolDefinition, ToolResult};

pub trait ToolRegistry: Send {
    /// Registers a tool under its name. A second tool with the same name is
    /// rejected.
    fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError>;

    fn contains(&self, name: &str) -> bool;
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Dispatches a call to the named tool.
    pub async fn call(&self, name: &str, args: Value) -> Result<ToolResult, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        Ok(tool.call(args).await)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        if self.contains(tool.name()) {
            return Err(RegistryError::DuplicateTool(tool.name().to_string()));
        }
        tracing::debug!(tool = %tool.name(), "Registered tool");
        self.tools.push(tool);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl std::fmt::Debug for InMemoryToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
