use super::RetrievedDocument;

pub const NO_CONTEXT_PLACEHOLDER: &str =
    "No se encontró contexto específico en los documentos oficiales.";
pub const FALLBACK_SOURCE_LABEL: &str = "Documento MINEDU";
const DEFAULT_LIMIT: usize = 5;

/// Renders the leading retrieved passages into one prompt block, keeping backend order.
#[derive(Clone, Copy, Debug)]
pub struct ContextAssembler {
    limit: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ContextAssembler {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn build(&self, documents: &[RetrievedDocument]) -> String {
        if documents.is_empty() || self.limit == 0 {
            return NO_CONTEXT_PLACEHOLDER.to_string();
        }

        documents
            .iter()
            .take(self.limit)
            .enumerate()
            .map(|(idx, doc)| render_document(idx + 1, doc))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_document(position: usize, doc: &RetrievedDocument) -> String {
    let source = if doc.source.trim().is_empty() {
        FALLBACK_SOURCE_LABEL
    } else {
        doc.source.trim()
    };
    format!(
        "DOCUMENTO {position} (Relevancia: {score:.2}):\nFuente: {source}\nContenido:\n{content}\n---",
        score = doc.score,
        content = doc.content.trim(),
    )
}
