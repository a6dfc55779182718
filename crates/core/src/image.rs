use thiserror::Error;

use crate::config::ImageConfig;
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{ImageModel, ImageRequest, LanguageModelError};
use crate::prompts::{PromptBuilder, PromptError, PromptTask};

pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";
const COMPONENT: &str = "image";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("no image model configured")]
    Unconfigured,
    #[error("image description must not be empty")]
    EmptyPrompt,
    #[error("failed to render image prompt: {0}")]
    Prompt(#[from] PromptError),
    #[error("image model invocation failed: {0}")]
    Model(#[source] LanguageModelError),
    #[error("image model returned no artifact")]
    EmptyArtifact,
}

/// One-shot image generation: fixed framing, fixed diffusion parameters, no retries.
pub struct ImageRequestClient<'a> {
    prompts: &'a PromptBuilder,
    sink: &'a dyn LogSink,
    config: &'a ImageConfig,
}

impl<'a> ImageRequestClient<'a> {
    pub fn new(prompts: &'a PromptBuilder, sink: &'a dyn LogSink, config: &'a ImageConfig) -> Self {
        Self {
            prompts,
            sink,
            config,
        }
    }

    pub fn request_for(&self, description: &str) -> Result<ImageRequest, ImageError> {
        let subject = description.trim();
        if subject.is_empty() {
            return Err(ImageError::EmptyPrompt);
        }
        let prompt = self.prompts.build(PromptTask::ImageFraming { subject })?;
        Ok(ImageRequest {
            prompt,
            cfg_scale: self.config.cfg_scale,
            seed: self.config.seed,
            steps: self.config.steps,
        })
    }

    /// Returns the first artifact as a PNG data URI.
    pub fn generate<M: ImageModel + ?Sized>(
        &self,
        model: &M,
        description: &str,
    ) -> Result<String, ImageError> {
        let request = self.request_for(description)?;
        let payload = model.generate(&request).map_err(ImageError::Model)?;
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ImageError::EmptyArtifact);
        }

        self.sink.log(LogRecord::new(
            LogLevel::Info,
            COMPONENT,
            format!("image generated ({} base64 chars)", payload.len()),
        ));
        Ok(format!("{DATA_URI_PREFIX}{payload}"))
    }
}
