/// Output side of a query: Markdown payloads for the user and a progress
/// spinner while model calls are in flight.
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::corpus::Document;
use crate::usage::CallReport;

/// Sink for rendered Markdown. Fire-and-forget: nothing is returned.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str);

    /// Show a transient status while something slow happens.
    fn status(&self, _message: &str) {}

    fn clear_status(&self) {}
}

/// Prints Markdown to stdout and a spinner to stderr.
pub struct TerminalRenderer {
    spinner: Mutex<Option<ProgressBar>>,
    show_progress: bool,
}

impl TerminalRenderer {
    #[must_use]
    pub fn new(show_progress: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            show_progress,
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, markdown: &str) {
        self.clear_status();
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{markdown}\n");
        let _ = out.flush();
    }

    fn status(&self, message: &str) {
        if !self.show_progress {
            return;
        }
        let Ok(mut slot) = self.spinner.lock() else {
            return;
        };
        if let Some(old) = slot.take() {
            old.finish_and_clear();
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        *slot = Some(bar);
    }

    fn clear_status(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Collects rendered payloads in memory.
#[derive(Default)]
pub struct MemoryRenderer {
    outputs: Mutex<Vec<String>>,
}

impl MemoryRenderer {
    pub fn outputs(&self) -> Vec<String> {
        self.outputs.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl Renderer for MemoryRenderer {
    fn render(&self, markdown: &str) {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push(markdown.to_string());
        }
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Italic metadata line for one model call.
#[must_use]
pub fn metadata_line(report: &CallReport) -> String {
    format!("_{report}_")
}

#[must_use]
pub fn selection_markdown(documents: &[&Document], report: &CallReport) -> String {
    let mut md = String::from("**Relevant files**\n\n");
    for doc in documents {
        md.push_str(&format!("- `{}`\n", doc.rel_path));
    }
    md.push('\n');
    md.push_str(&metadata_line(report));
    md
}

#[must_use]
pub fn no_relevant_markdown(report: &CallReport) -> String {
    format!(
        "No relevant documents found for this question.\n\n{}",
        metadata_line(report)
    )
}

#[must_use]
pub fn full_corpus_markdown(documents: usize, total_chars: usize) -> String {
    format!("_Corpus is small ({total_chars} chars), sending all {documents} documents._")
}

#[must_use]
pub fn answer_markdown(answer: &str, report: &CallReport) -> String {
    format!("{}\n\n---\n{}", answer.trim_end(), metadata_line(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::Usage;

    fn report() -> CallReport {
        CallReport {
            model: "gpt-4o".to_string(),
            usage: Usage {
                input_tokens: 1200,
                output_tokens: 30,
                ..Usage::default()
            },
            elapsed: Duration::from_millis(800),
            cost: 0.0033,
        }
    }

    #[test]
    fn test_selection_markdown_lists_paths() {
        let a = Document::new("docs/a.md", "a", 10).unwrap();
        let b = Document::new("b.adoc", "b", 10).unwrap();
        let md = selection_markdown(&[&a, &b], &report());
        assert!(md.starts_with("**Relevant files**\n\n- `docs/a.md`\n- `b.adoc`\n"));
        assert!(md.ends_with("_gpt-4o · $0.0033 · 800ms · 1,200 in / 30 out / 0 cache read / 0 cache write_"));
    }

    #[test]
    fn test_answer_markdown() {
        let md = answer_markdown("It works.\n\n", &report());
        assert!(md.starts_with("It works.\n\n---\n_gpt-4o"));
    }

    #[test]
    fn test_memory_renderer_collects() {
        let r = MemoryRenderer::default();
        r.status("ignored");
        r.render("one");
        r.render("two");
        r.clear_status();
        assert_eq!(r.outputs(), vec!["one", "two"]);
    }
}
