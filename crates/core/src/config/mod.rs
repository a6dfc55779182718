use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::retrieval::SearchType;

pub const DEFAULT_CRITERIA: [&str; 3] = [
    "Revisa la programación anterior y mejora la especificidad de los desempeños para que sean más observables y medibles en el contexto del aula. Cada desempeño debe describir con claridad qué hará el estudiante.",
    "Analiza la coherencia entre contenidos, desempeños y criterios de evaluación. Verifica que cada criterio permita evaluar el desempeño correspondiente y que todos estén alineados.",
    "Revisa y mejora los instrumentos de evaluación para que sean variados, pertinentes y prácticos de aplicar en el aula. Incluye instrumentos formativos y sumativos.",
];

const ENV_REGION: &str = "AWS_REGION";
const ENV_TEXT_MODEL: &str = "CURRICULUM_TEXT_MODEL";
const ENV_GROUNDED_MODEL: &str = "CURRICULUM_GROUNDED_MODEL";
const ENV_IMAGE_MODEL: &str = "CURRICULUM_IMAGE_MODEL";
const ENV_KNOWLEDGE_BASE: &str = "CURRICULUM_KNOWLEDGE_BASE";
const ENV_RUNTIME_ENDPOINT: &str = "CURRICULUM_RUNTIME_ENDPOINT";
const ENV_AGENT_ENDPOINT: &str = "CURRICULUM_AGENT_ENDPOINT";

fn default_text_model() -> String {
    "anthropic.claude-v2".to_string()
}

fn default_grounded_model() -> String {
    "anthropic.claude-v2:1".to_string()
}

fn default_image_model() -> String {
    "stability.stable-diffusion-xl-v1".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_passes() -> usize {
    3
}

fn default_acceptance_ratio() -> f64 {
    0.5
}

fn default_criteria() -> Vec<String> {
    DEFAULT_CRITERIA.iter().map(|c| c.to_string()).collect()
}

fn default_top_k() -> usize {
    10
}

fn default_context_limit() -> usize {
    5
}

fn default_cited_sources() -> usize {
    3
}

fn default_area() -> String {
    "ciencia_tecnologia".to_string()
}

fn default_cfg_scale() -> f32 {
    10.0
}

fn default_steps() -> u32 {
    50
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no backend region configured (set `backend.region` or AWS_REGION)")]
    MissingRegion,
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBaseIds {
    #[serde(default)]
    pub curriculum: String,
}

/// Where and how to reach the hosted generation and retrieval services.
///
/// Credentials are not stored here; the adapters resolve them through the
/// standard AWS chain (environment keys, shared profile, instance role).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub runtime_endpoint: Option<String>,
    #[serde(default)]
    pub agent_endpoint: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model_id: String,
    #[serde(default = "default_grounded_model")]
    pub grounded_model_id: String,
    #[serde(default = "default_image_model")]
    pub image_model_id: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub knowledge_bases: KnowledgeBaseIds,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            runtime_endpoint: None,
            agent_endpoint: None,
            text_model_id: default_text_model(),
            grounded_model_id: default_grounded_model(),
            image_model_id: default_image_model(),
            timeout: default_timeout(),
            knowledge_bases: KnowledgeBaseIds::default(),
        }
    }
}

/// Sampling parameters for one completion call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl SamplingConfig {
    pub fn draft() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.7,
            top_p: Some(0.9),
            stop_sequences: vec!["\n\nHuman:".to_string()],
        }
    }

    pub fn grounded() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.3,
            top_p: Some(0.9),
            stop_sequences: vec!["\n\nHuman:".to_string()],
        }
    }

    pub fn summary() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.5,
            top_p: None,
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SamplingProfiles {
    #[serde(default = "SamplingConfig::draft")]
    pub draft: SamplingConfig,
    #[serde(default = "SamplingConfig::grounded")]
    pub grounded: SamplingConfig,
    #[serde(default = "SamplingConfig::summary")]
    pub summary: SamplingConfig,
}

impl Default for SamplingProfiles {
    fn default() -> Self {
        Self {
            draft: SamplingConfig::draft(),
            grounded: SamplingConfig::grounded(),
            summary: SamplingConfig::summary(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RefinementConfig {
    #[serde(default = "default_passes")]
    pub passes: usize,
    /// A candidate must keep at least this fraction of the current draft length.
    #[serde(default = "default_acceptance_ratio")]
    pub acceptance_ratio: f64,
    #[serde(default = "default_criteria")]
    pub criteria: Vec<String>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            passes: default_passes(),
            acceptance_ratio: default_acceptance_ratio(),
            criteria: default_criteria(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default = "default_cited_sources")]
    pub cited_sources: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            search_type: SearchType::default(),
            context_limit: default_context_limit(),
            area: default_area(),
            cited_sources: default_cited_sources(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default)]
    pub seed: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cfg_scale: default_cfg_scale(),
            seed: 0,
            steps: default_steps(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    #[serde(default)]
    pub custom_directories: Vec<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sampling: SamplingProfiles,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    /// Loads `path` when it exists, otherwise starts from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized).map_err(io_error)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlays non-empty values returned by `lookup` onto the backend section.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let backend = &mut self.backend;
        if let Some(region) = read(ENV_REGION) {
            backend.region = region;
        }
        if let Some(model) = read(ENV_TEXT_MODEL) {
            backend.text_model_id = model;
        }
        if let Some(model) = read(ENV_GROUNDED_MODEL) {
            backend.grounded_model_id = model;
        }
        if let Some(model) = read(ENV_IMAGE_MODEL) {
            backend.image_model_id = model;
        }
        if let Some(id) = read(ENV_KNOWLEDGE_BASE) {
            backend.knowledge_bases.curriculum = id;
        }
        if let Some(url) = read(ENV_RUNTIME_ENDPOINT) {
            backend.runtime_endpoint = Some(url);
        }
        if let Some(url) = read(ENV_AGENT_ENDPOINT) {
            backend.agent_endpoint = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = &self.backend;
        let has_endpoint = backend
            .runtime_endpoint
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if backend.region.trim().is_empty() && !has_endpoint {
            return Err(ConfigError::MissingRegion);
        }

        if self.refinement.criteria.is_empty() {
            return Err(ConfigError::Invalid {
                field: "refinement.criteria",
                reason: "at least one critique criterion is required".to_string(),
            });
        }

        let ratio = self.refinement.acceptance_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "refinement.acceptance_ratio",
                reason: format!("expected a positive number, got {ratio}"),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "retrieval.top_k",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
