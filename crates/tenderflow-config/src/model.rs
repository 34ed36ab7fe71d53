//! Configuration schema for tenderflow.

use crate::ConfigError;
use chrono::NaiveDate;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tenderflow_protocol::DiagramKind;

/// Root config for the tenderflow pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenderflowConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl TenderflowConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> TenderflowConfigBuilder {
        TenderflowConfigBuilder::new()
    }
}

/// Builder for assembling a `TenderflowConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct TenderflowConfigBuilder {
    config: TenderflowConfig,
}

impl TenderflowConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: TenderflowConfig::default(),
        }
    }

    /// Replace the memory store configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the language model configuration.
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.config.model = model;
        self
    }

    /// Replace the tender analysis settings.
    pub fn analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.config.analysis = analysis;
        self
    }

    /// Replace the planning rates and start date.
    pub fn planning(mut self, planning: PlanningConfig) -> Self {
        self.config.planning = planning;
        self
    }

    /// Replace the workflow settings.
    pub fn workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.config.workflow = workflow;
        self
    }

    /// Finalize and return the built `TenderflowConfig`.
    pub fn build(self) -> TenderflowConfig {
        self.config
    }
}

/// Backing store used for stage outputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    #[default]
    File,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,
    /// Rollout directory; defaults to `~/.tenderflow/memory`.
    #[serde(default)]
    pub path: Option<String>,
}

impl MemoryConfig {
    /// Resolve the rollout directory, falling back to the user home.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => UserDirs::new()
                .map(|dirs| dirs.home_dir().join(".tenderflow").join("memory"))
                .ok_or(ConfigError::NoMemoryRoot),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    Openai,
    /// Deterministic local templates, no network.
    Offline,
}

/// Language model used for narrative sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            name: default_model_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Characters of source text kept in the stored excerpt.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_excerpt_chars() -> usize {
    1000
}

/// Rates used by the project planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanningConfig {
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
    #[serde(default = "default_hours_per_week")]
    pub hours_per_week: f64,
    #[serde(default = "default_contingency_rate")]
    pub contingency_rate: f64,
    /// Project start; today when unset.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            hourly_rate: default_hourly_rate(),
            hours_per_week: default_hours_per_week(),
            contingency_rate: default_contingency_rate(),
            start_date: None,
        }
    }
}

fn default_hourly_rate() -> f64 {
    75.0
}

fn default_hours_per_week() -> f64 {
    40.0
}

fn default_contingency_rate() -> f64 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    /// Diagrams produced by the visualization stage.
    #[serde(default = "default_diagrams")]
    pub diagrams: Vec<DiagramKind>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            diagrams: default_diagrams(),
        }
    }
}

fn default_diagrams() -> Vec<DiagramKind> {
    DiagramKind::ALL.to_vec()
}
