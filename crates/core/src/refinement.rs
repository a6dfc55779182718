//! Sequential critique-and-regenerate passes over a curriculum draft.
//!
//! Each pass sends the whole current draft back to the model together with
//! one critique criterion, chosen cyclically (`pass % criteria.len()`). A
//! candidate replaces the draft only when it passes [`accepts`]; the first
//! rejection, or any backend failure, ends the loop and the last accepted
//! draft is kept. The loop never makes more than `passes` calls.

use std::fmt;

use crate::config::{RefinementConfig, SamplingConfig};
use crate::curriculum::Grade;
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::LanguageModel;
use crate::prompts::{PromptBuilder, PromptTask};

const COMPONENT: &str = "refinement";

/// Why a pass did not produce a new draft.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectionReason {
    /// Candidate empty or shorter than `acceptance_ratio` of the current draft.
    Degenerate {
        candidate_chars: usize,
        current_chars: usize,
    },
    /// The model call failed; the error is not surfaced to the caller.
    Backend(String),
    /// The refinement prompt could not be rendered.
    Prompt(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degenerate {
                candidate_chars,
                current_chars,
            } => write!(
                f,
                "degenerate response ({candidate_chars} chars against a draft of {current_chars})"
            ),
            Self::Backend(message) => write!(f, "model call failed: {message}"),
            Self::Prompt(message) => write!(f, "prompt rendering failed: {message}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefinementOutcome {
    Accepted(String),
    Rejected(RejectionReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PassRecord {
    pub index: usize,
    pub criterion_index: usize,
    /// `None` when the pass never got a completion back.
    pub candidate_chars: Option<usize>,
    pub accepted: bool,
}

#[derive(Clone, Debug)]
pub struct RefinementReport {
    pub draft: String,
    pub passes: Vec<PassRecord>,
    pub halted: Option<RejectionReason>,
}

impl RefinementReport {
    pub fn accepted_passes(&self) -> usize {
        self.passes.iter().filter(|pass| pass.accepted).count()
    }
}

/// Denominator the acceptance ratio is fixed to before comparing lengths.
const RATIO_SCALE: u128 = 1_000_000;

/// Acceptance rule: non-empty and at least `ratio * current_chars` long.
///
/// The ratio is taken as a fraction over [`RATIO_SCALE`] and the comparison
/// runs in integers, so `candidate == ratio * current` is always accepted.
pub fn accepts(current_chars: usize, candidate_chars: usize, ratio: f64) -> bool {
    if candidate_chars == 0 {
        return false;
    }
    let numerator = (ratio * RATIO_SCALE as f64).round() as u128;
    (candidate_chars as u128).saturating_mul(RATIO_SCALE)
        >= (current_chars as u128).saturating_mul(numerator)
}

pub fn criterion_index(pass: usize, criteria_len: usize) -> usize {
    pass % criteria_len
}

/// Decides whether `candidate` may replace `current`. Pure apart from the returned value.
pub fn evaluate_candidate(current: &str, candidate: String, ratio: f64) -> RefinementOutcome {
    let candidate_chars = if candidate.trim().is_empty() {
        0
    } else {
        candidate.chars().count()
    };
    let current_chars = current.chars().count();

    if accepts(current_chars, candidate_chars, ratio) {
        RefinementOutcome::Accepted(candidate)
    } else {
        RefinementOutcome::Rejected(RejectionReason::Degenerate {
            candidate_chars,
            current_chars,
        })
    }
}

pub struct RefinementLoop<'a> {
    prompts: &'a PromptBuilder,
    sink: &'a dyn LogSink,
    config: &'a RefinementConfig,
    sampling: &'a SamplingConfig,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(
        prompts: &'a PromptBuilder,
        sink: &'a dyn LogSink,
        config: &'a RefinementConfig,
        sampling: &'a SamplingConfig,
    ) -> Self {
        Self {
            prompts,
            sink,
            config,
            sampling,
        }
    }

    pub fn run<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        initial_draft: String,
        grade: Grade,
    ) -> RefinementReport {
        let mut report = RefinementReport {
            draft: initial_draft,
            passes: Vec::with_capacity(self.config.passes),
            halted: None,
        };

        if self.config.criteria.is_empty() {
            self.log(
                LogLevel::Warn,
                "no critique criteria configured; keeping the initial draft",
            );
            return report;
        }

        for index in 0..self.config.passes {
            let criterion_index = criterion_index(index, self.config.criteria.len());
            let (record, outcome) = self.pass(model, &report.draft, grade, index, criterion_index);
            report.passes.push(record);

            match outcome {
                RefinementOutcome::Accepted(candidate) => {
                    self.log(
                        LogLevel::Info,
                        format!(
                            "pass {} accepted ({} chars)",
                            index + 1,
                            candidate.chars().count()
                        ),
                    );
                    report.draft = candidate;
                }
                RefinementOutcome::Rejected(reason) => {
                    self.log(
                        LogLevel::Warn,
                        format!("pass {} discarded: {reason}; stopping", index + 1),
                    );
                    report.halted = Some(reason);
                    break;
                }
            }
        }

        report
    }

    fn pass<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        current: &str,
        grade: Grade,
        index: usize,
        criterion_index: usize,
    ) -> (PassRecord, RefinementOutcome) {
        let mut record = PassRecord {
            index,
            criterion_index,
            candidate_chars: None,
            accepted: false,
        };

        let prompt = match self.prompts.build(PromptTask::Refinement {
            previous_draft: current,
            criterion: &self.config.criteria[criterion_index],
            grade,
        }) {
            Ok(prompt) => prompt,
            Err(err) => {
                return (
                    record,
                    RefinementOutcome::Rejected(RejectionReason::Prompt(err.to_string())),
                )
            }
        };

        let candidate = match model.invoke(&prompt, self.sampling) {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                return (
                    record,
                    RefinementOutcome::Rejected(RejectionReason::Backend(err.to_string())),
                )
            }
        };

        record.candidate_chars = Some(candidate.chars().count());
        let outcome = evaluate_candidate(current, candidate, self.config.acceptance_ratio);
        record.accepted = matches!(outcome, RefinementOutcome::Accepted(_));
        (record, outcome)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, COMPONENT, message));
    }
}
