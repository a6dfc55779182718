mod bedrock;
mod endpoint;
mod error;
mod image;
mod knowledge_base;
mod sdk;

pub use bedrock::BedrockTextModel;
pub use error::AdapterError;
pub use image::StabilityImageModel;
pub use knowledge_base::BedrockKnowledgeBase;

use curriculum_core::{Config, ImageModel, LanguageModel, RetrievalBackend};

/// Model used for plain drafts, refinement passes and comment summaries.
pub fn create_text_model(config: &Config) -> Result<Box<dyn LanguageModel>, AdapterError> {
    Ok(Box::new(BedrockTextModel::new(
        &config.backend,
        &config.backend.text_model_id,
    )?))
}

/// Model used when drafting against retrieved reference documents.
pub fn create_grounded_model(config: &Config) -> Result<Box<dyn LanguageModel>, AdapterError> {
    Ok(Box::new(BedrockTextModel::new(
        &config.backend,
        &config.backend.grounded_model_id,
    )?))
}

pub fn create_image_model(config: &Config) -> Result<Box<dyn ImageModel>, AdapterError> {
    Ok(Box::new(StabilityImageModel::new(&config.backend)?))
}

pub fn create_knowledge_base(config: &Config) -> Result<Box<dyn RetrievalBackend>, AdapterError> {
    if config.backend.knowledge_bases.curriculum.trim().is_empty() {
        return Err(AdapterError::invalid_config(
            "knowledge_bases.curriculum must be set for grounded generation",
        ));
    }
    Ok(Box::new(BedrockKnowledgeBase::new(&config.backend)?))
}
