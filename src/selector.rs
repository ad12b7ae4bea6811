/// Relevance selection: one model call over every outline, returning a ranked,
/// bounded list of documents from the corpus.
use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::corpus::{Corpus, Document};
use crate::llm::{ModelClient, ModelRequest, TimedResponse, invoke_timed};
use crate::outline;
use crate::pipeline::PipelineError;

/// The selector's model response held no usable path array.
#[derive(Error, Debug)]
pub enum RetrievalParseError {
    #[error("no JSON array found in selector response: {raw:?}")]
    NoArray { raw: String },

    #[error("selector response array is not a list of strings ({source}): {raw:?}")]
    NotStrings {
        raw: String,
        source: serde_json::Error,
    },
}

impl RetrievalParseError {
    /// The raw model response, for diagnosis.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::NoArray { raw } | Self::NotStrings { raw, .. } => raw,
        }
    }
}

/// Pull the first well-formed JSON array of strings out of a model response,
/// tolerating any commentary around it.
///
/// Every `[` is tried as the start of an array, so brackets in prose or inside
/// the paths themselves do not hide the real array.
pub fn parse_paths(response: &str) -> Result<Vec<String>, RetrievalParseError> {
    let mut first_error = None;
    for (start, _) in response.match_indices('[') {
        let mut values =
            serde_json::Deserializer::from_str(&response[start..]).into_iter::<Vec<String>>();
        match values.next() {
            Some(Ok(paths)) => return Ok(paths),
            Some(Err(err)) => {
                first_error.get_or_insert(err);
            }
            None => {}
        }
    }

    let raw = response.to_string();
    Err(match first_error {
        Some(source) => RetrievalParseError::NotStrings { raw, source },
        None => RetrievalParseError::NoArray { raw },
    })
}

fn instructions(max_selected: usize) -> String {
    format!(
        "You are a retrieval filter for a question-answering system. \
You will see outlines of the documents in a corpus; each outline has the document's \
path, its headings, and the beginning of its text.\n\n\
Return the paths of at most {max_selected} documents most likely to contain the \
answer to the user's question, as a JSON array of strings, most relevant first. \
Use the paths exactly as written. Return [] if no document is relevant.\n\n\
Respond with the JSON array only, with no commentary. Do not answer the question."
    )
}

/// Documents picked by the selector, borrowed from the corpus, in the model's order.
#[derive(Debug)]
pub struct Selection<'c> {
    pub documents: Vec<&'c Document>,
    pub call: TimedResponse,
}

pub struct RelevanceSelector<'m> {
    model: &'m dyn ModelClient,
    max_selected: usize,
    max_tokens: u32,
}

impl<'m> RelevanceSelector<'m> {
    pub fn new(model: &'m dyn ModelClient, max_selected: usize, max_tokens: u32) -> Self {
        Self {
            model,
            max_selected,
            max_tokens,
        }
    }

    /// The request sent for `question` over `corpus`.
    #[must_use]
    pub fn request(&self, corpus: &Corpus, question: &str) -> ModelRequest {
        ModelRequest {
            system: vec![
                instructions(self.max_selected),
                format!("<outlines>\n{}\n</outlines>", outline::encode_outlines(corpus)),
            ],
            documents: Vec::new(),
            prompt: question.to_string(),
            max_tokens: self.max_tokens,
        }
    }

    /// Rank the corpus against `question`. An empty selection is a valid result.
    pub async fn select<'c>(
        &self,
        corpus: &'c Corpus,
        question: &str,
    ) -> Result<Selection<'c>, PipelineError> {
        let call = invoke_timed(self.model, &self.request(corpus, question)).await?;
        debug!(raw = %call.response.text, "selector response");

        let paths = parse_paths(&call.response.text)?;
        let documents = resolve(corpus, paths, self.max_selected);
        Ok(Selection { documents, call })
    }
}

/// Keep the first `max` paths, then map them onto corpus documents in order.
/// Paths the corpus does not contain are dropped; repeats keep their first position.
pub fn resolve<'c>(corpus: &'c Corpus, paths: Vec<String>, max: usize) -> Vec<&'c Document> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .take(max)
        .filter(|path| seen.insert(path.clone()))
        .filter_map(|path| {
            let doc = corpus.get(&path);
            if doc.is_none() {
                warn!("selector returned unknown path {path:?}, dropping it");
            }
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockModel;

    fn corpus() -> Corpus {
        Corpus::from_documents(
            ["a.md", "b.md", "c.adoc", "d.md", "e.md", "f.md"]
                .iter()
                .map(|p| Document::new(*p, format!("# {p}\ntext"), 100).unwrap())
                .collect(),
        )
    }

    fn paths_of(docs: &[&Document]) -> Vec<String> {
        docs.iter().map(|d| d.rel_path.clone()).collect()
    }

    #[test]
    fn test_parse_tolerates_prose() {
        let paths = parse_paths("Sure! [\"a.md\", \"b.md\"] done.").unwrap();
        assert_eq!(paths, vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_parse_multiline_array() {
        let paths = parse_paths("```json\n[\n  \"x/y.md\",\n  \"z.adoc\"\n]\n```").unwrap();
        assert_eq!(paths, vec!["x/y.md", "z.adoc"]);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_paths("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_without_array_fails() {
        let err = parse_paths("I could not find anything relevant.").unwrap_err();
        assert!(matches!(err, RetrievalParseError::NoArray { .. }));
        assert_eq!(err.raw(), "I could not find anything relevant.");
    }

    #[test]
    fn test_parse_non_string_array_fails() {
        let err = parse_paths("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, RetrievalParseError::NotStrings { .. }));

        let err = parse_paths("[a.md, b.md]").unwrap_err();
        assert!(matches!(err, RetrievalParseError::NotStrings { .. }));
    }

    #[test]
    fn test_parse_paths_containing_brackets() {
        let paths = parse_paths("[\"docs/[slug].md\", \"a.md\"]").unwrap();
        assert_eq!(paths, vec!["docs/[slug].md", "a.md"]);
    }

    #[test]
    fn test_parse_skips_bracketed_prose() {
        let paths = parse_paths("Based on the outlines [see above], here: [\"a.md\"]").unwrap();
        assert_eq!(paths, vec!["a.md"]);

        // A non-string array before the real one is skipped too
        let paths = parse_paths("Scores [1, 2] then [\"b.md\"]").unwrap();
        assert_eq!(paths, vec!["b.md"]);
    }

    #[test]
    fn test_parse_brackets_without_array_fails() {
        let err = parse_paths("Nothing relevant [sorry].").unwrap_err();
        assert!(matches!(err, RetrievalParseError::NotStrings { .. }));
        assert_eq!(err.raw(), "Nothing relevant [sorry].");
    }

    #[test]
    fn test_resolve_keeps_model_order() {
        let corpus = corpus();
        let docs = resolve(&corpus, vec!["d.md".into(), "a.md".into(), "c.adoc".into()], 4);
        assert_eq!(paths_of(&docs), vec!["d.md", "a.md", "c.adoc"]);
    }

    #[test]
    fn test_resolve_truncates_then_drops_unknown() {
        let corpus = corpus();
        let paths = ["ghost.md", "b.md", "a.md", "e.md", "f.md"]
            .map(String::from)
            .to_vec();
        // The cap applies to the model's list, so the hallucination costs a slot
        let docs = resolve(&corpus, paths, 4);
        assert_eq!(paths_of(&docs), vec!["b.md", "a.md", "e.md"]);
    }

    #[test]
    fn test_resolve_returns_corpus_references() {
        let corpus = corpus();
        let docs = resolve(&corpus, vec!["b.md".into()], 4);
        assert!(std::ptr::eq(docs[0], corpus.get("b.md").unwrap()));
    }

    #[test]
    fn test_resolve_skips_repeats() {
        let corpus = corpus();
        let docs = resolve(&corpus, vec!["a.md".into(), "a.md".into(), "b.md".into()], 4);
        assert_eq!(paths_of(&docs), vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_request_carries_outlines_and_question() {
        let model = MockModel::new(Vec::<String>::new());
        let selector = RelevanceSelector::new(&model, 4, 1024);
        let req = selector.request(&corpus(), "where is f?");
        assert_eq!(req.prompt, "where is f?");
        assert!(req.system[0].contains("at most 4 documents"));
        assert_eq!(req.system[1].matches("<outline>").count(), 6);
        assert!(req.documents.is_empty());
    }

    #[tokio::test]
    async fn test_select_end_to_end() {
        let corpus = corpus();
        let model = MockModel::new(["Here you go: [\"f.md\", \"nope.md\", \"a.md\"]"]);
        let selection = RelevanceSelector::new(&model, 4, 1024)
            .select(&corpus, "q")
            .await
            .unwrap();
        assert_eq!(paths_of(&selection.documents), vec!["f.md", "a.md"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_select_parse_failure() {
        let corpus = corpus();
        let model = MockModel::new(["The answer is 42."]);
        let err = RelevanceSelector::new(&model, 4, 1024)
            .select(&corpus, "q")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RetrievalParse(_)));
    }
}
