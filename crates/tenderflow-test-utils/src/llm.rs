use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tenderflow_core::{CollaboratorError, LanguageModel, PromptContext};

/// Answers every prompt with the same text.
#[derive(Debug, Clone)]
pub struct FixedModel {
    response: String,
}

impl FixedModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn invoke(&self, _prompt: &PromptContext) -> Result<String, CollaboratorError> {
        Ok(self.response.clone())
    }
}

/// Fails every prompt with a status error.
#[derive(Debug, Clone, Default)]
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, _prompt: &PromptContext) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Status {
            status: 503,
            body: "model unavailable".to_string(),
        })
    }
}

/// Answers with fixed text and keeps every prompt it saw.
#[derive(Debug, Clone)]
pub struct RecordingModel {
    response: String,
    prompts: Arc<Mutex<Vec<PromptContext>>>,
}

impl RecordingModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<PromptContext> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn invoke(&self, prompt: &PromptContext) -> Result<String, CollaboratorError> {
        self.prompts.lock().push(prompt.clone());
        Ok(self.response.clone())
    }
}
