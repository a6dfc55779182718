use crate::config::PromptConfig;
use crate::curriculum::{GenerationRequest, Grade};

use super::{PromptError, PromptRegistry};

/// One prompt the pipeline needs, with the parameters specific to it.
#[derive(Clone, Copy, Debug)]
pub enum PromptTask<'a> {
    /// First full draft. `context` carries an assembled retrieval block.
    InitialDraft {
        request: &'a GenerationRequest,
        context: Option<&'a str>,
    },
    Refinement {
        previous_draft: &'a str,
        criterion: &'a str,
        grade: Grade,
    },
    CommentSummary {
        comments: &'a str,
    },
    ImageFraming {
        subject: &'a str,
    },
}

impl PromptTask<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitialDraft {
                context: Some(_), ..
            } => "grounded_draft",
            Self::InitialDraft { .. } => "initial_draft",
            Self::Refinement { .. } => "refinement",
            Self::CommentSummary { .. } => "comment_summary",
            Self::ImageFraming { .. } => "image_prompt",
        }
    }
}

/// Pure string construction over the prompt registry.
#[derive(Debug)]
pub struct PromptBuilder {
    registry: PromptRegistry,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, PromptError> {
        Ok(Self::with_registry(PromptRegistry::new()?))
    }

    pub fn from_prompt_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Ok(Self::with_registry(PromptRegistry::from_prompt_config(
            config,
        )?))
    }

    pub fn with_registry(registry: PromptRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, task: PromptTask<'_>) -> Result<String, PromptError> {
        match task {
            PromptTask::InitialDraft { request, context } => {
                let instructions = self.registry.format_with(
                    "initial_draft",
                    [
                        ("grade", request.grade.number().to_string()),
                        ("competency", request.competency.clone()),
                        ("capabilities", request.capabilities.clone()),
                        ("contents", request.contents.clone()),
                    ],
                )?;
                match context {
                    None => Ok(instructions),
                    Some(context) => self.registry.format_with(
                        "grounded_draft",
                        [
                            ("context", context.to_string()),
                            ("instructions", instructions),
                        ],
                    ),
                }
            }
            PromptTask::Refinement {
                previous_draft,
                criterion,
                grade,
            } => self.registry.format_with(
                "refinement",
                [
                    ("previous_draft", previous_draft.to_string()),
                    ("criterion", criterion.to_string()),
                    ("grade", grade.number().to_string()),
                ],
            ),
            PromptTask::CommentSummary { comments } => self
                .registry
                .format_with("comment_summary", [("comments", comments)]),
            PromptTask::ImageFraming { subject } => self
                .registry
                .format_with("image_prompt", [("subject", subject)]),
        }
    }
}
