//! Tools exposed via Model Context Protocol.
//!
//! A single `greet` tool: takes a name, returns the greeting both as text
//! content and as structured content.

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::rpc::{json_rpc_error, json_rpc_error_with_data, json_rpc_result};

#[macros::mcp_tool(name = "greet", description = "Greet a person by name")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GreetTool {
    pub name: String,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![GreetTool::tool()]
}

pub fn greeting(name: &str) -> String {
    format!("Hello, {name}!")
}

pub fn handle_tools_call(id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, -32602, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
    };

    match tool_call.name.as_str() {
        "greet" => {
            let args: GreetTool =
                match serde_json::from_value(json!(tool_call.arguments.unwrap_or_default())) {
                    Ok(value) => value,
                    Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
                };

            let message = greeting(&args.name);
            json_rpc_result(
                id,
                serde_json::to_value(CallToolResult {
                    content: vec![ContentBlock::from(TextContent::new(
                        message.clone(),
                        None,
                        None,
                    ))],
                    is_error: None,
                    meta: None,
                    structured_content: Some(serde_json::Map::from_iter([(
                        "result".to_string(),
                        json!(message),
                    )])),
                })
                .expect("greet tool result serialization"),
            )
        }
        _ => json_rpc_error_with_data(
            id,
            -32601,
            "Method not found",
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": tool_call.name,
                },
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_formats_the_name() {
        assert_eq!(greeting("World"), "Hello, World!");
        assert_eq!(greeting("Ford"), "Hello, Ford!");
    }

    #[test]
    fn greeting_does_not_trim_or_reject_unusual_names() {
        assert_eq!(greeting(""), "Hello, !");
        assert_eq!(greeting("  padded  "), "Hello,   padded  !");
    }

    #[test]
    fn greet_call_returns_text_and_structured_content() {
        let response = handle_tools_call(
            Some(json!(1)),
            Some(json!({ "name": "greet", "arguments": { "name": "World" } })),
        );

        let result = response.get("result").expect("result member");
        assert_eq!(result["content"][0]["text"], json!("Hello, World!"));
        assert_eq!(result["structuredContent"]["result"], json!("Hello, World!"));
    }

    #[test]
    fn greet_call_without_name_is_invalid_params() {
        let response = handle_tools_call(
            Some(json!(1)),
            Some(json!({ "name": "greet", "arguments": {} })),
        );

        assert_eq!(response["error"]["code"], json!(-32602));
    }

    #[test]
    fn greet_call_with_non_string_name_is_invalid_params() {
        let response = handle_tools_call(
            Some(json!(1)),
            Some(json!({ "name": "greet", "arguments": { "name": 42 } })),
        );

        assert_eq!(response["error"]["code"], json!(-32602));
    }

    #[test]
    fn unknown_tool_reports_tool_not_found() {
        let response = handle_tools_call(
            Some(json!(1)),
            Some(json!({ "name": "restart_service", "arguments": {} })),
        );

        assert_eq!(response["error"]["code"], json!(-32601));
        assert_eq!(
            response["error"]["data"]["code"],
            json!("tool_not_found")
        );
        assert_eq!(
            response["error"]["data"]["details"]["name"],
            json!("restart_service")
        );
    }

    #[test]
    fn tools_list_contains_only_greet() {
        let tools = build_tools_list();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "greet");
    }
}
