//! SUMO MCP server: traffic-simulation tooling exposed over JSON-RPC stdio.

pub mod mcp;
pub mod tools;
pub mod workflows;
