/// Query orchestration: route the corpus, select documents if needed, answer.
///
/// Model calls are strictly sequential; any failure aborts the query.
use thiserror::Error;
use tracing::info;

use crate::answer::{AnswerGenerator, DocumentMode, Scope};
use crate::corpus::{Corpus, Document, IndexingError};
use crate::llm::{ModelCallError, ModelClient, TimedResponse};
use crate::render::{self, Renderer};
use crate::router::{Route, route};
use crate::selector::{RelevanceSelector, RetrievalParseError};
use crate::usage::{CallReport, PriceTable, UnknownModelError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    RetrievalParse(#[from] RetrievalParseError),

    #[error("model call failed: {0}")]
    ModelCall(#[from] ModelCallError),

    #[error(transparent)]
    UnknownModel(#[from] UnknownModelError),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Corpora at or under this many characters skip selection.
    pub full_corpus_threshold: usize,
    pub max_selected: usize,
    pub max_tokens: u32,
    pub document_mode: DocumentMode,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            full_corpus_threshold: 100_000,
            max_selected: 4,
            max_tokens: 4096,
            document_mode: DocumentMode::Auxiliary,
        }
    }
}

/// Documents chosen by the selector and what the call cost.
#[derive(Debug)]
pub struct SelectionReport<'c> {
    pub documents: Vec<&'c Document>,
    pub report: CallReport,
}

#[derive(Debug)]
pub enum Outcome<'c> {
    Answered {
        /// `None` when the full corpus was sent without selection.
        selection: Option<SelectionReport<'c>>,
        answer: String,
        report: CallReport,
    },
    /// The selector found nothing relevant; no answer call was made.
    NoRelevantDocuments { report: CallReport },
    /// Nothing was indexed; no model call was made.
    EmptyCorpus,
}

pub struct Pipeline<'a> {
    selector_model: &'a dyn ModelClient,
    answer_model: &'a dyn ModelClient,
    prices: PriceTable,
    options: PipelineOptions,
    renderer: &'a dyn Renderer,
}

impl<'a> Pipeline<'a> {
    /// Fails if either model has no price entry, before any call is made.
    pub fn new(
        selector_model: &'a dyn ModelClient,
        answer_model: &'a dyn ModelClient,
        prices: PriceTable,
        options: PipelineOptions,
        renderer: &'a dyn Renderer,
    ) -> Result<Self, PipelineError> {
        prices.rates(selector_model.model())?;
        prices.rates(answer_model.model())?;
        Ok(Self {
            selector_model,
            answer_model,
            prices,
            options,
            renderer,
        })
    }

    /// Answer `question` over `corpus`, rendering progress as it goes.
    pub async fn ask<'c>(
        &self,
        corpus: &'c Corpus,
        question: &str,
    ) -> Result<Outcome<'c>, PipelineError> {
        if corpus.is_empty() {
            self.renderer
                .render("No documents to search: the directory has no Markdown or AsciiDoc files.");
            return Ok(Outcome::EmptyCorpus);
        }

        match route(corpus, self.options.full_corpus_threshold) {
            Route::FullCorpus { total_chars } => {
                self.renderer
                    .render(&render::full_corpus_markdown(corpus.len(), total_chars));
                let documents: Vec<&Document> = corpus.iter().collect();
                let (answer, report) = self.answer(&documents, question, Scope::Complete).await?;
                Ok(Outcome::Answered {
                    selection: None,
                    answer,
                    report,
                })
            }
            Route::Select { .. } => {
                let selector = RelevanceSelector::new(
                    self.selector_model,
                    self.options.max_selected,
                    self.options.max_tokens,
                );
                self.renderer.status("Selecting relevant documents…");
                let selected = selector.select(corpus, question).await;
                self.renderer.clear_status();
                let selected = selected?;
                let report = self.report(self.selector_model, &selected.call)?;
                info!(selected = selected.documents.len(), "selection complete");

                if selected.documents.is_empty() {
                    self.renderer.render(&render::no_relevant_markdown(&report));
                    return Ok(Outcome::NoRelevantDocuments { report });
                }

                self.renderer
                    .render(&render::selection_markdown(&selected.documents, &report));
                let (answer, answer_report) = self
                    .answer(&selected.documents, question, Scope::Partial)
                    .await?;
                Ok(Outcome::Answered {
                    selection: Some(SelectionReport {
                        documents: selected.documents,
                        report,
                    }),
                    answer,
                    report: answer_report,
                })
            }
        }
    }

    async fn answer(
        &self,
        documents: &[&Document],
        question: &str,
        scope: Scope,
    ) -> Result<(String, CallReport), PipelineError> {
        let generator = AnswerGenerator::new(
            self.answer_model,
            self.options.document_mode,
            self.options.max_tokens,
        );
        self.renderer.status("Answering…");
        let call = generator.answer(documents, question, scope).await;
        self.renderer.clear_status();
        let call = call?;

        let report = self.report(self.answer_model, &call)?;
        self.renderer
            .render(&render::answer_markdown(&call.response.text, &report));
        Ok((call.response.text, report))
    }

    fn report(
        &self,
        model: &dyn ModelClient,
        call: &TimedResponse,
    ) -> Result<CallReport, PipelineError> {
        let usage = call.response.usage;
        Ok(CallReport {
            model: model.model().to_string(),
            usage,
            elapsed: call.elapsed,
            cost: self.prices.cost(model.model(), &usage)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockModel;
    use crate::render::MemoryRenderer;

    fn corpus(size_each: usize) -> Corpus {
        Corpus::from_documents(
            ["a.md", "b.md", "c.md"]
                .iter()
                .map(|p| Document::new(*p, "x".repeat(size_each), 50).unwrap())
                .collect(),
        )
    }

    fn options(threshold: usize) -> PipelineOptions {
        PipelineOptions {
            full_corpus_threshold: threshold,
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_model_fails_before_calls() {
        let model = MockModel::new(["unused"]).named("mystery-model");
        let renderer = MemoryRenderer::default();
        let result = Pipeline::new(
            &model,
            &model,
            PriceTable::default(),
            options(10),
            &renderer,
        );
        assert!(matches!(result, Err(PipelineError::UnknownModel(_))));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_corpus_makes_no_calls() {
        let model = MockModel::new(Vec::<String>::new());
        let renderer = MemoryRenderer::default();
        let pipeline =
            Pipeline::new(&model, &model, PriceTable::default(), options(10), &renderer).unwrap();
        let corpus = Corpus::default();
        let outcome = pipeline.ask(&corpus, "anything?").await.unwrap();
        assert!(matches!(outcome, Outcome::EmptyCorpus));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_selector_failure_skips_answer() {
        let model = MockModel::new(["no array here", "should not be used"]);
        let renderer = MemoryRenderer::default();
        let pipeline =
            Pipeline::new(&model, &model, PriceTable::default(), options(10), &renderer).unwrap();
        let corpus = corpus(100);
        let err = pipeline.ask(&corpus, "q").await.unwrap_err();
        assert!(matches!(err, PipelineError::RetrievalParse(_)));
        assert_eq!(model.calls(), 1);
    }
}
