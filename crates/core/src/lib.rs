pub mod config;
pub mod curriculum;
pub mod image;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod refinement;
pub mod retrieval;

pub use config::{
    BackendConfig, Config, ConfigError, ImageConfig, KnowledgeBaseIds, PromptConfig,
    RefinementConfig, RetrievalConfig, SamplingConfig, SamplingProfiles, DEFAULT_CRITERIA,
};
pub use curriculum::{
    CurriculumDocument, CurriculumError, CurriculumService, GenerationRequest, Grade, Grounding,
};
pub use image::{ImageError, ImageRequestClient, DATA_URI_PREFIX};
pub use logging::{
    LogLevel, LogRecord, LogSink, NullLogSink, SharedLogSink, StderrLogSink, VecLogSink,
};
pub use model::{ImageModel, ImageRequest, LanguageModel, LanguageModelError};
pub use pipeline::{is_error_text, Pipeline, ERROR_MARKER};
pub use prompts::{
    PromptArguments, PromptBuilder, PromptError, PromptRegistry, PromptSource, PromptTask,
    PromptTemplate,
};
pub use refinement::{
    PassRecord, RefinementLoop, RefinementOutcome, RefinementReport, RejectionReason,
};
pub use retrieval::{
    ContextAssembler, RetrievalBackend, RetrievalClient, RetrievalError, RetrievalQuery,
    RetrievalResult, RetrievedDocument, SearchType, NO_CONTEXT_PLACEHOLDER,
};
