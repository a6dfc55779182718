use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use crate::config::RetrievalConfig;
use crate::curriculum::Grade;
use crate::logging::{LogLevel, LogRecord, SharedLogSink};

mod context;

pub use context::{ContextAssembler, FALLBACK_SOURCE_LABEL, NO_CONTEXT_PLACEHOLDER};

const COMPONENT: &str = "retrieval";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// Semantic plus keyword matching.
    #[default]
    Hybrid,
    Semantic,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hybrid => "HYBRID",
            Self::Semantic => "SEMANTIC",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub source: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Documents in the order the backend ranked them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrievalResult {
    pub documents: Vec<RetrievedDocument>,
    pub total_found: usize,
}

impl RetrievalResult {
    pub fn from_documents(documents: Vec<RetrievedDocument>) -> Self {
        let total_found = documents.len();
        Self {
            documents,
            total_found,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalQuery {
    pub knowledge_base_id: String,
    pub text: String,
    pub number_of_results: usize,
    pub search_type: SearchType,
}

#[derive(Debug)]
pub struct RetrievalError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl RetrievalError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl StdError for RetrievalError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// A document index that answers ranked passage queries.
pub trait RetrievalBackend: Send + Sync {
    fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

impl<T: RetrievalBackend + ?Sized> RetrievalBackend for Box<T> {
    fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        (**self).retrieve(query)
    }
}

/// Queries one knowledge base. Backend failures degrade to an empty result.
pub struct RetrievalClient<B> {
    backend: B,
    knowledge_base_id: String,
    top_k: usize,
    search_type: SearchType,
    sink: SharedLogSink,
}

impl<B: RetrievalBackend> RetrievalClient<B> {
    pub fn new(
        backend: B,
        knowledge_base_id: impl Into<String>,
        config: &RetrievalConfig,
        sink: SharedLogSink,
    ) -> Self {
        Self {
            backend,
            knowledge_base_id: knowledge_base_id.into(),
            top_k: config.top_k,
            search_type: config.search_type,
            sink,
        }
    }

    pub fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }

    pub fn search(&self, query: &str, grade: Grade, area: &str) -> RetrievalResult {
        let request = RetrievalQuery {
            knowledge_base_id: self.knowledge_base_id.clone(),
            text: enrich_query(query, grade, area),
            number_of_results: self.top_k,
            search_type: self.search_type,
        };

        match self.backend.retrieve(&request) {
            Ok(documents) => {
                let result = RetrievalResult::from_documents(documents);
                self.log(
                    LogLevel::Info,
                    format!(
                        "{} documents retrieved from `{}`",
                        result.total_found, self.knowledge_base_id
                    ),
                );
                result
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    format!("search in `{}` failed: {err}", self.knowledge_base_id),
                );
                RetrievalResult::default()
            }
        }
    }

    fn log(&self, level: LogLevel, message: String) {
        self.sink.log(LogRecord::new(level, COMPONENT, message));
    }
}

/// Adds grade, subject area and curriculum-framework qualifiers to a raw query.
pub fn enrich_query(query: &str, grade: Grade, area: &str) -> String {
    format!(
        "Buscar información sobre: {}\nContexto: Educación secundaria {}º grado, área de {}\nPaís: Perú, Currículo Nacional de Educación Básica",
        query.trim(),
        grade.number(),
        area.replace('_', " ")
    )
}
