/// Answer generation: the second model call, over full document content.
use serde::{Deserialize, Serialize};

use crate::corpus::Document;
use crate::llm::{ModelClient, ModelRequest, TimedResponse, invoke_timed};
use crate::outline;
use crate::pipeline::PipelineError;

const BASE_INSTRUCTIONS: &str = "You answer questions about a set of documents, using only \
those documents. Answer concisely in Markdown, leading with prose; use lists, tables or code \
blocks only where they make the answer clearer. Mention the paths of the documents you relied on. \
If the documents do not contain the answer, say so plainly, and explicitly flag anything you \
infer beyond them as speculation.";

const PARTIAL_SCOPE: &str = "The documents you have been given were selected for relevance \
from a larger corpus. They are a truncated, non-exhaustive view of it: if something is missing \
here, it may still exist elsewhere in the corpus, so say that it was not found in the provided \
documents rather than that it does not exist.";

const COMPLETE_SCOPE: &str = "The documents you have been given are the complete corpus. If \
something is not in them, it is not in the corpus.";

/// How document content is placed in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// One auxiliary block per document, cacheable independently.
    Auxiliary,
    /// All documents concatenated into the user turn.
    Inline,
}

/// Whether the documents sent are the whole corpus or a selection from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Complete,
    Partial,
}

/// System instructions for an answer over documents of the given scope.
#[must_use]
pub fn instructions(scope: Scope) -> String {
    let scope_note = match scope {
        Scope::Complete => COMPLETE_SCOPE,
        Scope::Partial => PARTIAL_SCOPE,
    };
    format!("{BASE_INSTRUCTIONS}\n\n{scope_note}")
}

pub struct AnswerGenerator<'m> {
    model: &'m dyn ModelClient,
    mode: DocumentMode,
    max_tokens: u32,
}

impl<'m> AnswerGenerator<'m> {
    pub fn new(model: &'m dyn ModelClient, mode: DocumentMode, max_tokens: u32) -> Self {
        Self {
            model,
            mode,
            max_tokens,
        }
    }

    #[must_use]
    pub fn request(&self, documents: &[&Document], question: &str, scope: Scope) -> ModelRequest {
        let blocks = documents.iter().map(|d| outline::encode_document(d));
        let system = vec![instructions(scope)];

        match self.mode {
            DocumentMode::Auxiliary => ModelRequest {
                system,
                documents: blocks.collect(),
                prompt: question.to_string(),
                max_tokens: self.max_tokens,
            },
            DocumentMode::Inline => ModelRequest {
                system,
                documents: Vec::new(),
                prompt: format!(
                    "<documents>\n{}\n</documents>\n\n<question>\n{question}\n</question>",
                    blocks.collect::<Vec<_>>().join("\n\n")
                ),
                max_tokens: self.max_tokens,
            },
        }
    }

    /// Answer `question` from `documents`. Single request, no follow-up turns.
    pub async fn answer(
        &self,
        documents: &[&Document],
        question: &str,
        scope: Scope,
    ) -> Result<TimedResponse, PipelineError> {
        let request = self.request(documents, question, scope);
        Ok(invoke_timed(self.model, &request).await?)
    }
}
