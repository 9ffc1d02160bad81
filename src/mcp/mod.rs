//! MCP (Model Context Protocol) server for Colloquy
//!
//! Exposes the tool registry as MCP tools for other assistants.

mod server;

pub use server::{run_mcp_server, serve};
