//! Chat-completions [`Proposer`].

use async_trait::async_trait;
use shaderloop_core::{
    EditRequest, InitialRequest, Proposal, ProposalError, Proposer, RepairRequest,
};
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, CompletionOptions};
use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::parse::parse_shader_reply;
use crate::prompts;

const TEMPERATURE: f32 = 0.4;

/// Proposer backed by an OpenAI-compatible endpoint.
///
/// Without an API key every call fails immediately with
/// `ProposalError::NotConfigured`, which the loop turns into its fallback
/// candidate.
#[derive(Debug, Clone)]
pub struct OpenAiProposer {
    client: Option<ChatClient>,
    model: String,
}

impl OpenAiProposer {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = match ChatClient::new(config) {
            Ok(client) => Some(client),
            Err(LlmError::MissingApiKey) => {
                warn!("OPENAI_API_KEY not set; proposer will use fallbacks");
                None
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&LlmConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn ask(&self, messages: Vec<ChatMessage>) -> std::result::Result<Proposal, ProposalError> {
        let client = self.client.as_ref().ok_or(LlmError::MissingApiKey)?;
        let text = client
            .complete(
                &messages,
                CompletionOptions {
                    model: &self.model,
                    temperature: TEMPERATURE,
                    json_object: true,
                },
            )
            .await?;
        let proposal = parse_shader_reply(&text)?;
        debug!(
            model = %self.model,
            source_len = proposal.source.len(),
            "proposal received"
        );
        Ok(proposal)
    }
}

#[async_trait]
impl Proposer for OpenAiProposer {
    async fn propose_initial(
        &self,
        request: &InitialRequest,
    ) -> std::result::Result<Proposal, ProposalError> {
        self.ask(vec![
            ChatMessage::system(prompts::SYSTEM_JSON),
            ChatMessage::user(prompts::initial(request)),
        ])
        .await
    }

    async fn propose_edit(
        &self,
        request: &EditRequest,
    ) -> std::result::Result<Proposal, ProposalError> {
        self.ask(vec![
            ChatMessage::system(prompts::SYSTEM_JSON),
            ChatMessage::user(prompts::edit(request)),
        ])
        .await
    }

    async fn repair(&self, request: &RepairRequest) -> std::result::Result<Proposal, ProposalError> {
        self.ask(vec![
            ChatMessage::system(prompts::SYSTEM_JSON),
            ChatMessage::user(prompts::repair(request)),
            ChatMessage::user(request.source.clone()),
        ])
        .await
    }
}
