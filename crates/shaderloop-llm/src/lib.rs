//! OpenAI-compatible collaborators for shaderloop.
//!
//! - [`OpenAiProposer`]: initial, edit and repair proposals in JSON mode
//! - [`OpenAiCritic`]: image-to-image critique and target discovery
//!
//! Both read [`LlmConfig`] from the environment and fail fast when
//! credentials are absent, so the loop falls back without waiting on the
//! network.

pub mod client;
pub mod config;
pub mod critic;
pub mod error;
pub mod parse;
pub mod prompts;
pub mod proposer;

pub use client::{png_data_url, ChatClient, ChatMessage, CompletionOptions, ContentPart};
pub use config::LlmConfig;
pub use critic::OpenAiCritic;
pub use error::{LlmError, Result};
pub use parse::parse_shader_reply;
pub use proposer::OpenAiProposer;
