//! Language model seam and its OpenAI-compatible and offline implementations.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tenderflow_config::{ModelConfig, ModelProvider};
use tenderflow_protocol::RecordKind;

/// Prompt handed to the model for one narrative section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptContext {
    pub stage: RecordKind,
    pub instruction: String,
    /// Structured material the model should ground its answer in.
    pub context: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: &PromptContext) -> Result<String, CollaboratorError>;
}

/// Build the configured model. Falls back to [`OfflineModel`] when the API
/// key variable is unset.
pub fn model_from_config(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>, CollaboratorError> {
    match config.provider {
        ModelProvider::Offline => {
            info!("using offline model");
            Ok(Arc::new(OfflineModel))
        }
        ModelProvider::Openai => match std::env::var(&config.api_key_env) {
            Ok(api_key) if !api_key.trim().is_empty() => {
                info!(
                    "using chat completions model (name={}, base_url={})",
                    config.name, config.base_url
                );
                Ok(Arc::new(HttpChatModel::from_config(config, api_key)?))
            }
            _ => {
                warn!(
                    "api key variable not set, falling back to offline model (env={})",
                    config.api_key_env
                );
                Ok(Arc::new(OfflineModel))
            }
        },
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpChatModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl HttpChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1024,
        }
    }

    pub fn from_config(config: &ModelConfig, api_key: String) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    /// Point at a different compatible endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LanguageModel for HttpChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &PromptContext) -> Result<String, CollaboratorError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(prompt.stage).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("{}\n\n{}", prompt.instruction, prompt.context),
                },
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.3),
        };
        debug!(
            "sending chat completion (stage={}, model={})",
            prompt.stage, self.model
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Status { status, body });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(CollaboratorError::EmptyResponse)
    }
}

fn system_prompt(stage: RecordKind) -> &'static str {
    match stage {
        RecordKind::TenderAnalysis => {
            "You are a tender analyst. Summarize the client's needs and flag gaps in the tender."
        }
        RecordKind::SolutionStrategy => {
            "You are a solution architect. Explain why the proposed architecture fits the tender."
        }
        RecordKind::Visualization => {
            "You are a technical illustrator. Describe the diagram in one sentence."
        }
        RecordKind::ProjectPlan => {
            "You are a delivery manager. Comment on the feasibility of the project plan."
        }
        RecordKind::TechnicalProposal => {
            "You are a technical writer. Write a short, professional cover letter for the proposal."
        }
    }
}

/// Deterministic stand-in used without network access or credentials.
#[derive(Debug, Default, Clone)]
pub struct OfflineModel;

#[async_trait]
impl LanguageModel for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    async fn invoke(&self, prompt: &PromptContext) -> Result<String, CollaboratorError> {
        let lead = prompt
            .context
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no additional context");
        let body = match prompt.stage {
            RecordKind::TenderAnalysis => {
                "Automated review of the tender. Validate the extracted requirements and resolve the missing information before committing to a solution."
            }
            RecordKind::SolutionStrategy => {
                "The layered architecture separates presentation, business logic and data so that each tier scales independently and integrates with existing systems through documented APIs."
            }
            RecordKind::Visualization => "Diagram generated from the solution strategy.",
            RecordKind::ProjectPlan => {
                "The plan sequences discovery, two development phases and a hardening phase. Durations use the upper bound of each estimate."
            }
            RecordKind::TechnicalProposal => {
                "Thank you for the opportunity to respond. This proposal describes our solution, delivery plan and commercial terms."
            }
        };
        Ok(format!("{body}\n\nContext: {lead}"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}
