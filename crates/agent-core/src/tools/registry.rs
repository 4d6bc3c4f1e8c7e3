use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::tools::types::{ToolCallResult, ToolDef, ToolError};

pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDef;
    async fn execute(&self, args: ToolArguments) -> Result<ToolCallResult, ToolError>;
}

pub type SharedTool = Arc<dyn Tool>;

/// List-and-call capability the gateway and orchestrator see.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    fn list_tools(&self) -> Vec<ToolDef>;

    /// Unknown tools are an error. A tool that fails while running yields an
    /// `is_error` result; `ToolError::Execution` is left for catalogs that
    /// cannot reach the tool at all (a remote catalog whose transport fails).
    async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<ToolCallResult, ToolError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),
}

pub struct ToolRegistry {
    tools: DashMap<String, SharedTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = tool.definition().name.trim().to_string();

        if name.is_empty() {
            return Err(RegistryError::InvalidTool(
                "tool name cannot be empty".to_string(),
            ));
        }

        match self.tools.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateTool(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolCatalog for ToolRegistry {
    fn list_tools(&self) -> Vec<ToolDef> {
        let mut tools: Vec<ToolDef> = self
            .tools
            .iter()
            .map(|entry| entry.value().definition())
            .collect();
        tools.sort_by(|left, right| left.name.cmp(&right.name));
        tools
    }

    async fn call_tool(&self, name: &str, args: ToolArguments) -> Result<ToolCallResult, ToolError> {
        // Clone the handle out so the map shard is not held across the await.
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        match tool.execute(args).await {
            Ok(result) => Ok(result),
            Err(ToolError::NotFound(missing)) => Err(ToolError::NotFound(missing)),
            Err(error) => {
                log::warn!("Tool '{}' failed: {}", name, error);
                Ok(ToolCallResult::failure(error.to_string()))
            }
        }
    }
}
