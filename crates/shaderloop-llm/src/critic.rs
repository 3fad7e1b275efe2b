//! Vision-model [`Critic`].

use async_trait::async_trait;
use image::RgbImage;
use shaderloop_core::{Critic, CriticError};
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, CompletionOptions, ContentPart};
use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::prompts;

const TEMPERATURE: f32 = 0.2;

/// Critic comparing target and output through a vision model.
///
/// Disabled when no API key is set or `VISION_DISABLED` is truthy; every
/// call then fails immediately with `CriticError::Disabled`.
#[derive(Debug, Clone)]
pub struct OpenAiCritic {
    client: Option<ChatClient>,
    model: String,
    prompt: String,
}

impl OpenAiCritic {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = if config.vision_disabled {
            debug!("vision disabled; critic will return stubs");
            None
        } else {
            match ChatClient::new(config) {
                Ok(client) => Some(client),
                Err(LlmError::MissingApiKey) => {
                    warn!("OPENAI_API_KEY not set; critic will return stubs");
                    None
                }
                Err(err) => return Err(err),
            }
        };
        Ok(Self {
            client,
            model: config.vision_model.clone(),
            prompt: prompts::CRITIQUE_PROMPT.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&LlmConfig::from_env())
    }

    /// Replace the default comparison prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn ask(&self, parts: Vec<ContentPart>) -> Result<String> {
        let client = self.client.as_ref().ok_or(LlmError::VisionDisabled)?;
        client
            .complete(
                &[ChatMessage::user_parts(parts)],
                CompletionOptions {
                    model: &self.model,
                    temperature: TEMPERATURE,
                    json_object: false,
                },
            )
            .await
    }
}

#[async_trait]
impl Critic for OpenAiCritic {
    async fn critique(
        &self,
        target: &RgbImage,
        output: &RgbImage,
    ) -> std::result::Result<String, CriticError> {
        if !self.is_enabled() {
            return Err(LlmError::VisionDisabled.into());
        }
        let parts = vec![
            ContentPart::text(self.prompt.clone()),
            ContentPart::png(target)?,
            ContentPart::png(output)?,
        ];
        Ok(self.ask(parts).await?)
    }

    async fn discover(
        &self,
        target: &RgbImage,
        reference_context: Option<&str>,
    ) -> std::result::Result<String, CriticError> {
        if !self.is_enabled() {
            return Err(LlmError::VisionDisabled.into());
        }
        let parts = vec![
            ContentPart::text(prompts::discovery(reference_context)),
            ContentPart::png(target)?,
        ];
        Ok(self.ask(parts).await?)
    }
}
