pub mod builtin;
pub mod registry;
pub mod types;

pub use builtin::GetCurrentTimeTool;
pub use registry::{RegistryError, SharedTool, Tool, ToolArguments, ToolCatalog, ToolRegistry};
pub use types::{ContentPart, ToolCallResult, ToolDef, ToolError};
