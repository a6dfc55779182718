use crate::refinement::{PassRecord, RefinementReport, RejectionReason};
use crate::retrieval::{RetrievalResult, FALLBACK_SOURCE_LABEL};

pub const SOURCES_HEADING: &str = "FUENTES OFICIALES CONSULTADAS:";
pub const TOTAL_ANALYSED_LABEL: &str = "Total de documentos oficiales analizados:";

/// Reference material a grounded document was drafted from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grounding {
    pub sources: Vec<String>,
    pub total_found: usize,
}

impl Grounding {
    pub fn from_result(result: &RetrievalResult, cited: usize) -> Self {
        let sources = result
            .documents
            .iter()
            .take(cited)
            .map(|doc| {
                if doc.source.trim().is_empty() {
                    FALLBACK_SOURCE_LABEL.to_string()
                } else {
                    doc.source.trim().to_string()
                }
            })
            .collect();
        Self {
            sources,
            total_found: result.total_found,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CurriculumDocument {
    pub body: String,
    pub passes: Vec<PassRecord>,
    pub halted: Option<RejectionReason>,
    pub grounding: Option<Grounding>,
}

impl CurriculumDocument {
    pub fn from_report(report: RefinementReport) -> Self {
        Self {
            body: report.draft,
            passes: report.passes,
            halted: report.halted,
            grounding: None,
        }
    }

    pub fn refinement_calls(&self) -> usize {
        self.passes.len()
    }

    /// Final text handed to callers, with the sources trailer for grounded documents.
    pub fn render(&self) -> String {
        let Some(grounding) = &self.grounding else {
            return self.body.clone();
        };

        let mut out = String::with_capacity(self.body.len() + 256);
        out.push_str(&self.body);
        out.push_str("\n\n");
        out.push_str(SOURCES_HEADING);
        out.push('\n');
        for source in &grounding.sources {
            out.push_str("- ");
            out.push_str(source);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!("{TOTAL_ANALYSED_LABEL} {}", grounding.total_found));
        out
    }
}
