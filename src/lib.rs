//! Colloquy: conversational Q&A over a chat-completion model.
//!
//! This library provides:
//! - Multi-turn sessions with bounded, in-memory history
//! - A tool registry the model can call into mid-conversation
//! - The orchestration loop interleaving model rounds with tool execution
//! - An OpenAI-compatible model client
//! - HTTP, MCP and console front ends
//!
//! # Example
//!
//! ```rust,no_run
//! use colloquy::{Agent, AskRequest, Settings};
//!
//! # async fn run() -> colloquy::ColloquyResult<()> {
//! let agent = Agent::from_settings(&Settings::from_env()?)?;
//! let outcome = agent
//!     .ask(AskRequest::new("What is 125 * 48 + 67?").tool_names(["calculate"]))
//!     .await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
#[cfg(feature = "mcp")]
pub mod mcp;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

// Re-export key types
pub use crate::agent::{Agent, AskOutcome, AskRequest, ConversationHistory, Message, Role, ToolCallRecord, Usage};
pub use crate::config::Settings;
pub use crate::error::{ColloquyError, ColloquyResult};
pub use crate::llm::{ChatModel, OpenAiProvider};
pub use crate::tools::{default_registry, Tool, ToolRegistry};
