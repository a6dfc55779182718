use std::fmt;
use thiserror::Error;

use crate::config::{Config, SamplingConfig};
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{LanguageModel, LanguageModelError};
use crate::prompts::{PromptBuilder, PromptError, PromptTask};
use crate::refinement::RefinementLoop;
use crate::retrieval::{ContextAssembler, RetrievalBackend, RetrievalClient};

mod document;

pub use document::{CurriculumDocument, Grounding, SOURCES_HEADING, TOTAL_ANALYSED_LABEL};

const COMPONENT: &str = "curriculum";
const CURRICULUM_QUERY_PREFIX: &str = "programación curricular ciencia y tecnología";
const CURRICULUM_QUERY_KEYWORDS: &str =
    "competencias capacidades desempeños criterios evaluación";

#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("grade {0} is not a secondary grade (expected 3, 4 or 5)")]
    InvalidGrade(u8),
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("failed to render prompt `{task}`: {source}")]
    Prompt {
        task: &'static str,
        #[source]
        source: PromptError,
    },
    #[error("language model invocation failed for `{task}`: {source}")]
    Model {
        task: &'static str,
        #[source]
        source: LanguageModelError,
    },
    #[error("`{task}` returned empty content")]
    EmptyResponse { task: &'static str },
}

/// Secondary-school grades the curriculum generator covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Grade {
    Third,
    Fourth,
    Fifth,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Third, Grade::Fourth, Grade::Fifth];

    pub fn number(&self) -> u8 {
        match self {
            Self::Third => 3,
            Self::Fourth => 4,
            Self::Fifth => 5,
        }
    }
}

impl TryFrom<u8> for Grade {
    type Error = CurriculumError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::Third),
            4 => Ok(Self::Fourth),
            5 => Ok(Self::Fifth),
            other => Err(CurriculumError::InvalidGrade(other)),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}º", self.number())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub grade: Grade,
    pub competency: String,
    pub capabilities: String,
    pub contents: String,
}

impl GenerationRequest {
    pub fn new(
        grade: u8,
        competency: impl Into<String>,
        capabilities: impl Into<String>,
        contents: impl Into<String>,
    ) -> Result<Self, CurriculumError> {
        let request = Self {
            grade: Grade::try_from(grade)?,
            competency: competency.into(),
            capabilities: capabilities.into(),
            contents: contents.into(),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), CurriculumError> {
        for (field, value) in [
            ("competency", &self.competency),
            ("capabilities", &self.capabilities),
            ("contents", &self.contents),
        ] {
            if value.trim().is_empty() {
                return Err(CurriculumError::EmptyField(field));
            }
        }
        Ok(())
    }

    /// Raw retrieval query for this request, before grade/area enrichment.
    pub fn curriculum_query(&self) -> String {
        format!(
            "{CURRICULUM_QUERY_PREFIX} {} grado secundaria {CURRICULUM_QUERY_KEYWORDS} {} {}",
            self.grade.number(),
            self.competency.trim(),
            self.contents.trim()
        )
    }
}

pub struct CurriculumService<'a> {
    prompts: &'a PromptBuilder,
    sink: &'a dyn LogSink,
    config: &'a Config,
}

impl<'a> CurriculumService<'a> {
    pub fn new(prompts: &'a PromptBuilder, sink: &'a dyn LogSink, config: &'a Config) -> Self {
        Self {
            prompts,
            sink,
            config,
        }
    }

    /// Initial draft followed by the refinement passes. Only the initial call can fail.
    pub fn generate<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        request: &GenerationRequest,
    ) -> Result<CurriculumDocument, CurriculumError> {
        request.validate()?;
        self.log(
            LogLevel::Info,
            format!("generating curriculum for {} grade", request.grade),
        );

        let task = PromptTask::InitialDraft {
            request,
            context: None,
        };
        let draft = self.draft(model, task, &self.config.sampling.draft)?;
        Ok(self.refine(model, draft, request))
    }

    /// Retrieval-grounded variant: context is injected into the initial draft only.
    pub fn generate_grounded<M, B>(
        &self,
        model: &M,
        retrieval: &RetrievalClient<B>,
        request: &GenerationRequest,
    ) -> Result<CurriculumDocument, CurriculumError>
    where
        M: LanguageModel + ?Sized,
        B: RetrievalBackend,
    {
        request.validate()?;
        let settings = &self.config.retrieval;
        let result = retrieval.search(
            &request.curriculum_query(),
            request.grade,
            &settings.area,
        );
        if result.is_empty() {
            self.log(
                LogLevel::Warn,
                "no reference documents found; drafting without grounding material",
            );
        }

        let context = ContextAssembler::new(settings.context_limit).build(&result.documents);
        let task = PromptTask::InitialDraft {
            request,
            context: Some(&context),
        };
        let draft = self.draft(model, task, &self.config.sampling.grounded)?;

        let mut document = self.refine(model, draft, request);
        document.grounding = Some(Grounding::from_result(&result, settings.cited_sources));
        Ok(document)
    }

    pub fn summarize_comments<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        comments: &str,
    ) -> Result<String, CurriculumError> {
        if comments.trim().is_empty() {
            return Err(CurriculumError::EmptyField("comments"));
        }
        self.draft(
            model,
            PromptTask::CommentSummary { comments },
            &self.config.sampling.summary,
        )
    }

    fn draft<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        task: PromptTask<'_>,
        sampling: &SamplingConfig,
    ) -> Result<String, CurriculumError> {
        let label = task.label();
        let prompt = self
            .prompts
            .build(task)
            .map_err(|source| CurriculumError::Prompt {
                task: label,
                source,
            })?;
        let text = model
            .invoke(&prompt, sampling)
            .map_err(|source| CurriculumError::Model {
                task: label,
                source,
            })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CurriculumError::EmptyResponse { task: label });
        }

        self.log(
            LogLevel::Info,
            format!("{label}: {} chars", text.chars().count()),
        );
        Ok(text.to_string())
    }

    fn refine<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        draft: String,
        request: &GenerationRequest,
    ) -> CurriculumDocument {
        let report = RefinementLoop::new(
            self.prompts,
            self.sink,
            &self.config.refinement,
            &self.config.sampling.draft,
        )
        .run(model, draft, request.grade);
        self.log(
            LogLevel::Info,
            format!(
                "refinement kept {} of {} passes",
                report.accepted_passes(),
                report.passes.len()
            ),
        );
        CurriculumDocument::from_report(report)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, COMPONENT, message));
    }
}
