/// Decides whether the selection stage is worth running for a corpus.
use tracing::info;

use crate::corpus::Corpus;

/// Which path a query takes through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The corpus is small enough to send whole; skip selection.
    FullCorpus { total_chars: usize },
    /// Run the relevance selector first.
    Select { total_chars: usize },
}

/// Route on summed content length: at or under `threshold` characters sends
/// the full corpus.
#[must_use]
pub fn route(corpus: &Corpus, threshold: usize) -> Route {
    let total_chars = corpus.total_chars();
    let route = if total_chars <= threshold {
        Route::FullCorpus { total_chars }
    } else {
        Route::Select { total_chars }
    };
    info!(total_chars, threshold, ?route, "routed query");
    route
}
