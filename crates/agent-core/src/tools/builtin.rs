use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::tools::registry::{Tool, ToolArguments};
use crate::tools::types::{ToolCallResult, ToolDef, ToolError};

/// Reports the current UTC time.
pub struct GetCurrentTimeTool;

#[async_trait]
impl Tool for GetCurrentTimeTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: "get_current_time".to_string(),
            title: "Current time".to_string(),
            description: "Get the current date and time in UTC (RFC 3339)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
            output_schema: Some(json!({
                "type": "object",
                "properties": { "utc": { "type": "string" } }
            })),
        }
    }

    async fn execute(&self, _args: ToolArguments) -> Result<ToolCallResult, ToolError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Ok(ToolCallResult {
            structured_content: Some(json!({ "utc": now })),
            ..ToolCallResult::text(now)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_rfc3339_utc_time() {
        let result = GetCurrentTimeTool.execute(ToolArguments::new()).await.unwrap();

        assert!(!result.is_error);
        let text = &result.content[0].text;
        assert!(text.ends_with('Z'), "expected UTC suffix in {text}");
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
        assert_eq!(result.structured_content.unwrap()["utc"], json!(text));
    }
}
