use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use curriculum_core::{
    is_error_text, Config, CurriculumService, GenerationRequest, Grade, LanguageModel,
    LanguageModelError, LogLevel, Pipeline, PromptBuilder, RejectionReason, RetrievalBackend,
    RetrievalClient, RetrievalError, RetrievalQuery, RetrievedDocument, SamplingConfig,
    VecLogSink, DEFAULT_CRITERIA, NO_CONTEXT_PLACEHOLDER,
};

const COMPETENCY: &str = "Indaga mediante métodos científicos para construir sus conocimientos";
const CAPABILITIES: &str = "Problematiza situaciones; diseña estrategias; genera y registra datos";
const CONTENTS: &str = "Materia y energía; movimiento rectilíneo; célula";

enum Reply {
    Text(String),
    Fail(&'static str),
}

#[derive(Clone, Debug)]
struct Call {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

/// Replays scripted replies in order; once the script runs out it either
/// echoes a completion as long as the prompt or fails.
struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    echo_when_exhausted: bool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedModel {
    fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            echo_when_exhausted: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn echo() -> Self {
        Self {
            echo_when_exhausted: true,
            ..Self::new([])
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().expect("mock mutex poisoned").len()
    }
}

impl LanguageModel for ScriptedModel {
    fn invoke(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LanguageModelError> {
        self.calls.lock().expect("mock mutex poisoned").push(Call {
            prompt: prompt.to_string(),
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
        });

        let next = self.replies.lock().expect("mock mutex poisoned").pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(LanguageModelError::new(io::Error::new(
                io::ErrorKind::Other,
                message,
            ))),
            None if self.echo_when_exhausted => Ok("x".repeat(prompt.chars().count())),
            None => Err(LanguageModelError::new(io::Error::new(
                io::ErrorKind::Other,
                "mock language model has no remaining responses",
            ))),
        }
    }
}

fn text(ch: char, len: usize) -> Reply {
    Reply::Text(ch.to_string().repeat(len))
}

struct StaticBackend {
    documents: Vec<RetrievedDocument>,
}

impl RetrievalBackend for StaticBackend {
    fn retrieve(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Ok(self.documents.clone())
    }
}

struct UnreachableBackend;

impl RetrievalBackend for UnreachableBackend {
    fn retrieve(&self, _query: &RetrievalQuery) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Err(RetrievalError::new(io::Error::new(
            io::ErrorKind::TimedOut,
            "retrieve timed out",
        )))
    }
}

fn reference_documents() -> Vec<RetrievedDocument> {
    (1..=4)
        .map(|n| RetrievedDocument {
            content: format!("Estándar de aprendizaje {n}"),
            source: format!("s3://minedu/cneb-{n}.pdf"),
            score: 1.0 - n as f64 / 10.0,
            ..RetrievedDocument::default()
        })
        .collect()
}

fn request(grade: u8) -> GenerationRequest {
    GenerationRequest::new(grade, COMPETENCY, CAPABILITIES, CONTENTS).expect("valid request")
}

fn config_with_passes(passes: usize) -> Config {
    let mut config = Config::default();
    config.refinement.passes = passes;
    config
}

#[test]
fn every_grade_invokes_model_once_plus_passes() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(3);
    let service = CurriculumService::new(&prompts, &sink, &config);

    for grade in [3u8, 4, 5] {
        let model = ScriptedModel::echo();
        let document = service.generate(&model, &request(grade))?;

        assert!(!document.body.is_empty());
        assert_eq!(model.call_count(), 1 + 3, "grade {grade}");
        assert_eq!(document.refinement_calls(), 3);
        assert!(document.halted.is_none());
        assert!(model.calls()[0]
            .prompt
            .contains(&format!("{grade}º de secundaria")));
    }
    Ok(())
}

#[test]
fn rejected_second_pass_keeps_first_refinement() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(3);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::new([
        text('a', 1000),
        text('b', 900),
        text('c', 440),
        text('d', 2000),
    ]);
    let document = service.generate(&model, &request(3))?;

    assert_eq!(model.call_count(), 3, "initial call plus exactly two passes");
    assert_eq!(document.body, "b".repeat(900));
    assert_eq!(document.refinement_calls(), 2);
    assert_eq!(
        document.halted,
        Some(RejectionReason::Degenerate {
            candidate_chars: 440,
            current_chars: 900,
        })
    );
    assert!(sink.contains(LogLevel::Warn, "pass 2 discarded"));
    Ok(())
}

#[test]
fn boundary_candidate_is_accepted() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(2);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::new([text('a', 900), text('b', 450), text('c', 224)]);
    let document = service.generate(&model, &request(4))?;

    assert_eq!(document.body, "b".repeat(450));
    assert_eq!(model.call_count(), 3);
    assert!(document.halted.is_some());
    Ok(())
}

#[test]
fn first_pass_rejection_returns_initial_draft() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(3);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::new([text('a', 1000), Reply::Text("   ".into())]);
    let document = service.generate(&model, &request(5))?;

    assert_eq!(document.body, "a".repeat(1000));
    assert_eq!(model.call_count(), 2);
    Ok(())
}

#[test]
fn criteria_rotate_over_more_passes_than_criteria() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(5);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::echo();
    let document = service.generate(&model, &request(3))?;

    let sequence: Vec<usize> = document.passes.iter().map(|p| p.criterion_index).collect();
    assert_eq!(sequence, vec![0, 1, 2, 0, 1]);
    assert!(sink.contains(LogLevel::Info, "refinement kept 5 of 5 passes"));

    let calls = model.calls();
    assert_eq!(calls.len(), 6);
    for (pass, call) in calls.iter().skip(1).enumerate() {
        let expected = DEFAULT_CRITERIA[pass % DEFAULT_CRITERIA.len()];
        assert!(call.prompt.contains(expected), "pass {pass}");
        for (other, criterion) in DEFAULT_CRITERIA.iter().enumerate() {
            if other != pass % DEFAULT_CRITERIA.len() {
                assert!(!call.prompt.contains(criterion));
            }
        }
    }
    Ok(())
}

#[test]
fn refinement_prompt_carries_whole_previous_draft() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(2);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let first = "COMPETENCIA: Indaga\nDESEMPEÑOS:\n- Formula preguntas sobre la materia";
    let second = "COMPETENCIA: Indaga\nDESEMPEÑOS:\n- Formula preguntas observables sobre la materia";
    let model = ScriptedModel::new([
        Reply::Text(format!("  {first}\n")),
        Reply::Text(second.into()),
        Reply::Text(second.into()),
    ]);
    service.generate(&model, &request(3))?;

    let calls = model.calls();
    assert!(calls[1].prompt.contains(first));
    assert!(calls[2].prompt.contains(second));
    assert_eq!(calls[1].max_tokens, 4000);
    Ok(())
}

#[test]
fn configured_ratio_accepts_its_exact_boundary() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let mut config = config_with_passes(2);
    config.refinement.acceptance_ratio = 0.07;
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::new([text('a', 100), text('b', 7), text('c', 0)]);
    let document = service.generate(&model, &request(5))?;

    assert_eq!(document.body, "b".repeat(7));
    assert!(document.passes[0].accepted);
    assert!(!document.passes[1].accepted);
    Ok(())
}

#[test]
fn padded_completions_are_trimmed_before_measuring() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(1);
    let service = CurriculumService::new(&prompts, &sink, &config);

    // 100 chars of text inside 200 chars of whitespace measures as 100.
    let padding = " ".repeat(100);
    let model = ScriptedModel::new([
        text('a', 200),
        Reply::Text(format!("{padding}{}{padding}", "b".repeat(100))),
    ]);
    let document = service.generate(&model, &request(4))?;

    assert_eq!(document.body, "b".repeat(100));
    assert_eq!(document.passes[0].candidate_chars, Some(100));
    assert!(document.passes[0].accepted);
    Ok(())
}

#[test]
fn refinement_backend_failure_is_fail_soft() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = VecLogSink::new();
    let config = config_with_passes(3);
    let service = CurriculumService::new(&prompts, &sink, &config);

    let model = ScriptedModel::new([
        text('a', 800),
        text('b', 700),
        Reply::Fail("throttled by service"),
    ]);
    let document = service.generate(&model, &request(4))?;

    assert_eq!(document.body, "b".repeat(700));
    assert_eq!(model.call_count(), 3);
    assert!(matches!(
        document.halted,
        Some(RejectionReason::Backend(ref m)) if m.contains("throttled")
    ));
    Ok(())
}

#[test]
fn initial_failure_surfaces_as_error_text() -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(ScriptedModel::new([Reply::Fail("access denied")]));
    let sink = Arc::new(VecLogSink::new());
    let pipeline = Pipeline::new(config_with_passes(3), Box::new(model.clone()), sink.clone())?;

    let output = pipeline.generate_curriculum(3, COMPETENCY, CAPABILITIES, CONTENTS);

    assert!(is_error_text(&output));
    assert!(output.starts_with("Error al generar la programación curricular: "));
    assert!(output.contains("access denied"));
    assert_eq!(model.call_count(), 1);
    assert!(sink.contains(LogLevel::Error, "access denied"));
    Ok(())
}

#[test]
fn invalid_grade_fails_without_model_call() -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(ScriptedModel::echo());
    let pipeline = Pipeline::new(
        Config::default(),
        Box::new(model.clone()),
        Arc::new(VecLogSink::new()),
    )?;

    let output = pipeline.generate_curriculum(6, COMPETENCY, CAPABILITIES, CONTENTS);

    assert!(is_error_text(&output));
    assert_eq!(model.call_count(), 0);
    Ok(())
}

#[test]
fn grounded_generation_injects_context_once_and_cites_sources(
) -> Result<(), Box<dyn std::error::Error>> {
    let drafting = Arc::new(ScriptedModel::new([text('a', 600), text('b', 600), text('c', 600)]));
    let plain = Arc::new(ScriptedModel::echo());
    let pipeline = Pipeline::new(
        config_with_passes(2),
        Box::new(plain.clone()),
        Arc::new(VecLogSink::new()),
    )?
    .with_grounded_model(Box::new(drafting.clone()))
    .with_retrieval(Box::new(StaticBackend {
        documents: reference_documents(),
    }));

    let output = pipeline.generate_curriculum(4, COMPETENCY, CAPABILITIES, CONTENTS);

    assert!(!is_error_text(&output));
    assert_eq!(plain.call_count(), 0);

    let calls = drafting.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].prompt.contains("DOCUMENTO 1 (Relevancia: 0.90)"));
    assert!(calls[0].prompt.contains("EXCLUSIVAMENTE"));
    assert_eq!(calls[0].max_tokens, 2000);
    assert!((calls[0].temperature - 0.3).abs() < f32::EPSILON);
    assert!(!calls[1].prompt.contains("DOCUMENTO 1"));

    assert!(output.starts_with(&"c".repeat(600)));
    assert!(output.contains(
        "FUENTES OFICIALES CONSULTADAS:\n- s3://minedu/cneb-1.pdf\n- s3://minedu/cneb-2.pdf\n- s3://minedu/cneb-3.pdf\n"
    ));
    assert!(!output.contains("- s3://minedu/cneb-4.pdf"));
    assert!(output.ends_with("Total de documentos oficiales analizados: 4"));
    Ok(())
}

#[test]
fn retrieval_failure_degrades_to_ungrounded_draft() -> Result<(), Box<dyn std::error::Error>> {
    let prompts = PromptBuilder::new()?;
    let sink = Arc::new(VecLogSink::new());
    let config = config_with_passes(1);
    let service = CurriculumService::new(&prompts, &*sink, &config);
    let retrieval = RetrievalClient::new(
        UnreachableBackend,
        "KB-CURRICULO",
        &config.retrieval,
        sink.clone(),
    );

    let model = ScriptedModel::new([text('a', 300), text('b', 300)]);
    let document = service.generate_grounded(&model, &retrieval, &request(5))?;

    assert_eq!(document.body, "b".repeat(300));
    assert!(model.calls()[0].prompt.contains(NO_CONTEXT_PLACEHOLDER));
    let grounding = document.grounding.expect("grounded document");
    assert_eq!(grounding.total_found, 0);
    assert!(grounding.sources.is_empty());
    assert!(sink.contains(LogLevel::Error, "retrieve timed out"));
    Ok(())
}

#[test]
fn comment_summary_uses_summary_sampling() -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(ScriptedModel::new([Reply::Text(
        "  Opiniones positivas sobre los experimentos.  ".into(),
    )]));
    let pipeline = Pipeline::new(
        Config::default(),
        Box::new(model.clone()),
        Arc::new(VecLogSink::new()),
    )?;

    let summary = pipeline.summarize_comments("Me gustó el laboratorio. La sesión 3 fue confusa.");

    assert_eq!(summary, "Opiniones positivas sobre los experimentos.");
    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].max_tokens, 500);
    assert!(calls[0].prompt.contains("La sesión 3 fue confusa."));
    Ok(())
}

#[test]
fn summary_failure_and_missing_image_model_are_error_text(
) -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(ScriptedModel::new([Reply::Fail("service unavailable")]));
    let pipeline = Pipeline::new(
        Config::default(),
        Box::new(model.clone()),
        Arc::new(VecLogSink::new()),
    )?;

    let summary = pipeline.summarize_comments("Buena clase");
    assert!(summary.starts_with("Error al generar el resumen: "));

    let image = pipeline.generate_image("laboratorio escolar");
    assert!(image.starts_with("Error al generar la imagen: "));
    Ok(())
}

#[test]
fn grade_round_trips_through_request() {
    for grade in Grade::ALL {
        let request = request(grade.number());
        assert_eq!(request.grade, grade);
    }
}
