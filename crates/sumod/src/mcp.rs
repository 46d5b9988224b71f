//! The MCP (Model Context Protocol) endpoint: JSON-RPC 2.0 over stdio lines.
//!
//! Only the slice of the protocol this server needs: `initialize`,
//! `tools/list`, and `tools/call`. Tool handlers take raw JSON arguments and
//! return plain text; failures inside a tool travel as that text, so the
//! JSON-RPC error channel is reserved for protocol misuse.

use std::io::{self, BufRead, Write};

use serde::Deserialize;
use serde_json::{json, Value};

// JSON-RPC 2.0 error codes.
const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Wire-facing description of one tool, as served by `tools/list`.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema for the tool's `arguments` object.
    pub input_schema: Value,
}

pub type ToolHandler = Box<dyn Fn(&Value) -> String>;

struct RegisteredTool {
    spec: ToolSpec,
    run: ToolHandler,
}

/// A protocol-level failure, rendered into the JSON-RPC `error` member.
struct Refusal {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl Refusal {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// The parts of a request line this server looks at.
#[derive(Debug, Deserialize)]
struct Envelope {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

pub struct McpServer {
    tools: Vec<RegisteredTool>,
    initialized: bool,
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl McpServer {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            initialized: false,
        }
    }

    /// Register a tool. A tool already registered under the same name is
    /// replaced.
    pub fn register_tool(&mut self, spec: ToolSpec, run: ToolHandler) {
        self.tools.retain(|tool| tool.spec.name != spec.name);
        self.tools.push(RegisteredTool { spec, run });
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.spec.name).collect()
    }

    /// Handle one line of input. `None` means no reply is owed (blank line
    /// or notification).
    pub fn process_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let raw: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                return Some(reply(
                    Value::Null,
                    Err(Refusal::new(PARSE_ERROR, format!("invalid JSON: {err}"))),
                ));
            }
        };
        let envelope: Envelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                return Some(reply(
                    Value::Null,
                    Err(Refusal::new(
                        INVALID_REQUEST,
                        format!("malformed request: {err}"),
                    )),
                ));
            }
        };

        let id = envelope.id.clone();
        let outcome = self.dispatch(&envelope);
        // A request without an id is a notification; its outcome is dropped.
        id.map(|id| reply(id, outcome))
    }

    /// Serve requests line by line until stdin closes. stdout carries only
    /// JSON-RPC frames; logging goes to stderr.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for line in stdin.lock().lines() {
            if let Some(response) = self.process_line(&line?) {
                out.write_all(response.as_bytes())?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, envelope: &Envelope) -> Result<Value, Refusal> {
        if envelope.jsonrpc != "2.0" {
            return Err(Refusal::new(
                INVALID_REQUEST,
                format!("unsupported JSON-RPC version '{}'", envelope.jsonrpc),
            ));
        }
        let params = envelope.params.clone().unwrap_or_else(|| json!({}));

        match envelope.method.as_str() {
            "initialize" => {
                if !params.is_object() {
                    return Err(Refusal::new(
                        INVALID_PARAMS,
                        "initialize params must be an object",
                    ));
                }
                self.initialized = true;
                Ok(json!({
                    "serverInfo": {
                        "name": "sumo-mcp",
                        "version": env!("CARGO_PKG_VERSION")
                    },
                    "capabilities": {
                        "tools": { "listChanged": false }
                    }
                }))
            }
            "initialized" => {
                self.initialized = true;
                Ok(Value::Null)
            }
            "tools/list" => {
                self.ensure_initialized()?;
                Ok(self.tools_payload())
            }
            "tools/call" => {
                self.ensure_initialized()?;
                self.call_tool(&params)
            }
            other => Err(Refusal::new(
                METHOD_NOT_FOUND,
                format!("unknown method '{other}'"),
            )),
        }
    }

    fn ensure_initialized(&self) -> Result<(), Refusal> {
        if self.initialized {
            Ok(())
        } else {
            Err(Refusal::new(INVALID_REQUEST, "server not initialized"))
        }
    }

    fn tools_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.spec.name,
                    "description": tool.spec.description,
                    "inputSchema": tool.spec.input_schema
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    fn call_tool(&self, params: &Value) -> Result<Value, Refusal> {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return Err(Refusal::new(
                INVALID_PARAMS,
                "tools/call needs a string 'name'",
            ));
        };
        let Some(tool) = self.tools.iter().find(|tool| tool.spec.name == name) else {
            return Err(Refusal {
                code: METHOD_NOT_FOUND,
                message: format!("no such tool '{name}'"),
                data: Some(json!({ "name": name })),
            });
        };

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let text = (tool.run)(&arguments);
        // Tool failures are already phrased in the text itself.
        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }))
    }
}

fn reply(id: Value, outcome: Result<Value, Refusal>) -> String {
    let body = match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(refusal) => {
            let mut error = json!({ "code": refusal.code, "message": refusal.message });
            if let Some(data) = refusal.data {
                error["data"] = data;
            }
            json!({ "jsonrpc": "2.0", "id": id, "error": error })
        }
    };
    body.to_string()
}
