//! The outward boundary used by simple textual callers.
//!
//! Typed methods return `Result`; the string methods serialise failures as
//! text starting with [`ERROR_MARKER`] so a caller that only handles strings
//! can still tell a document from a failure.

use crate::config::Config;
use crate::curriculum::{CurriculumDocument, CurriculumError, CurriculumService, GenerationRequest};
use crate::image::{ImageError, ImageRequestClient};
use crate::logging::{LogLevel, LogRecord, SharedLogSink};
use crate::model::{ImageModel, LanguageModel};
use crate::prompts::{PromptBuilder, PromptError};
use crate::retrieval::{RetrievalBackend, RetrievalClient};

pub const ERROR_MARKER: &str = "Error";

const CURRICULUM_FAILURE: &str = "Error al generar la programación curricular";
const SUMMARY_FAILURE: &str = "Error al generar el resumen";
const IMAGE_FAILURE: &str = "Error al generar la imagen";

pub fn is_error_text(text: &str) -> bool {
    text.starts_with(ERROR_MARKER)
}

pub struct Pipeline {
    config: Config,
    prompts: PromptBuilder,
    sink: SharedLogSink,
    model: Box<dyn LanguageModel>,
    grounded_model: Option<Box<dyn LanguageModel>>,
    retrieval: Option<RetrievalClient<Box<dyn RetrievalBackend>>>,
    image_model: Option<Box<dyn ImageModel>>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        model: Box<dyn LanguageModel>,
        sink: SharedLogSink,
    ) -> Result<Self, PromptError> {
        let prompts = PromptBuilder::from_prompt_config(&config.prompts)?;
        Ok(Self {
            config,
            prompts,
            sink,
            model,
            grounded_model: None,
            retrieval: None,
            image_model: None,
        })
    }

    /// Model used for the grounded initial draft and its refinement passes.
    pub fn with_grounded_model(mut self, model: Box<dyn LanguageModel>) -> Self {
        self.grounded_model = Some(model);
        self
    }

    /// Enables grounded generation against the configured curriculum knowledge base.
    pub fn with_retrieval(mut self, backend: Box<dyn RetrievalBackend>) -> Self {
        let client = RetrievalClient::new(
            backend,
            self.config.backend.knowledge_bases.curriculum.clone(),
            &self.config.retrieval,
            self.sink.clone(),
        );
        self.retrieval = Some(client);
        self
    }

    pub fn with_image_model(mut self, model: Box<dyn ImageModel>) -> Self {
        self.image_model = Some(model);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<CurriculumDocument, CurriculumError> {
        let service = self.service();
        match &self.retrieval {
            Some(retrieval) => {
                let model = self.grounded_model.as_ref().unwrap_or(&self.model);
                service.generate_grounded(model, retrieval, request)
            }
            None => service.generate(&self.model, request),
        }
    }

    pub fn summarize(&self, comments: &str) -> Result<String, CurriculumError> {
        self.service().summarize_comments(&self.model, comments)
    }

    pub fn image(&self, description: &str) -> Result<String, ImageError> {
        let model = self.image_model.as_ref().ok_or(ImageError::Unconfigured)?;
        ImageRequestClient::new(&self.prompts, self.sink.as_ref(), &self.config.image)
            .generate(model, description)
    }

    pub fn generate_curriculum(
        &self,
        grade: u8,
        competency: &str,
        capabilities: &str,
        contents: &str,
    ) -> String {
        let result = GenerationRequest::new(grade, competency, capabilities, contents)
            .and_then(|request| self.generate(&request));
        match result {
            Ok(document) => document.render(),
            Err(err) => self.failure(CURRICULUM_FAILURE, &err),
        }
    }

    pub fn summarize_comments(&self, comments: &str) -> String {
        self.summarize(comments)
            .unwrap_or_else(|err| self.failure(SUMMARY_FAILURE, &err))
    }

    /// PNG data URI on success.
    pub fn generate_image(&self, description: &str) -> String {
        self.image(description)
            .unwrap_or_else(|err| self.failure(IMAGE_FAILURE, &err))
    }

    fn service(&self) -> CurriculumService<'_> {
        CurriculumService::new(&self.prompts, self.sink.as_ref(), &self.config)
    }

    fn failure(&self, prefix: &str, err: &dyn std::error::Error) -> String {
        let text = format!("{prefix}: {err}");
        self.sink
            .log(LogRecord::new(LogLevel::Error, "pipeline", text.clone()));
        text
    }
}
