//! Prompt text sent to the model.

use crate::catalog::ToolCatalog;
use crate::dispatch::ToolResults;

const SYSTEM_TEMPLATE: &str = "\
You are an efficient and reliable assistant with access to the following tools:

{tools}

Choose the tools that best answer the user's request. You may call several
tools at once, and the same tool more than once with different arguments.

When you need tools, reply ONLY with JSON in exactly this format, without
any other text:
[
    {\"tool\": \"tool-name\", \"arguments\": {\"argument-name\": \"value\"}},
    {\"tool\": \"another-tool\", \"arguments\": {\"argument-name\": \"value\"}}
]

A single call may also be sent as one object instead of an array.
When no tool is needed, answer in plain text.

After receiving tool results:
1. Deliver a concise and clear summary.
2. Integrate only the most relevant details into a natural response.
3. Avoid repeating raw data.
4. If a tool failed, say which one and why.

Use only the tools listed above.";

/// The system message seeded at session start.
pub fn system_prompt(catalog: &ToolCatalog) -> String {
    SYSTEM_TEMPLATE.replace("{tools}", catalog.render().trim_end())
}

/// The message that hands a batch of results back to the model.
pub fn tool_results_message(results: &ToolResults) -> serde_json::Result<String> {
    let mut message = String::from("Tool results:\n");
    message.push_str(&serde_json::to_string_pretty(results)?);
    for (key, error) in results.failures() {
        message.push_str(&format!("\ntool {} failed: {error}", key.tool_name));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{CallKey, ToolCallRequest, ToolCallResult, ToolError, ToolOutput};
    use serde_json::json;

    #[test]
    fn empty_catalog_still_renders_instructions() {
        let prompt = system_prompt(&ToolCatalog::default());
        assert!(prompt.contains("reply ONLY with JSON"));
        assert!(!prompt.contains("{tools}"));
    }

    #[test]
    fn results_message_lists_failures() {
        let results: ToolResults = [
            (
                CallKey::new(0, "search"),
                ToolCallResult::success(
                    ToolCallRequest::new("search", json!({"query": "rust"})),
                    "web",
                    ToolOutput::new(json!("3 hits")),
                ),
            ),
            (
                CallKey::new(1, "fetch"),
                ToolCallResult::failure(
                    ToolCallRequest::new("fetch", json!({})),
                    None,
                    ToolError::UnknownTool("fetch".into()),
                ),
            ),
        ]
        .into_iter()
        .collect();

        let message = tool_results_message(&results).unwrap();
        assert!(message.starts_with("Tool results:\n{"));
        assert!(message.contains("\"search_0\""));
        assert!(message.ends_with("tool fetch failed: unknown tool: fetch"));
    }
}
