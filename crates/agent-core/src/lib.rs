pub mod agent;
pub mod budget;
pub mod protocol;
pub mod tools;

pub use agent::{Message, Role, Session};
pub use budget::{BudgetError, ClippedContext, ContextBudgeter, HeuristicTokenizer, SharedTokenizer, Tokenizer};
pub use protocol::{error_code, frame_type, RequestFrame, ResponseFrame};
pub use tools::{ToolCallResult, ToolCatalog, ToolDef, ToolError, ToolRegistry};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
