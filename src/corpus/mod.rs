/// Corpus indexing: one lightweight [`Document`] per Markdown/AsciiDoc file.
///
/// The whole corpus is rebuilt on every invocation; nothing is persisted.
pub mod headings;
pub mod walk;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use headings::Markup;
pub use walk::{SourceFile, list_files};

/// Errors that abort indexing. No partial corpus is ever returned.
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("not a readable directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        source: ignore::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
}

/// An indexed document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub rel_path: String,
    pub content: String,
    pub head: String,
    pub headings: Vec<String>,
}

impl Document {
    /// Build a document from its relative path and full text.
    ///
    /// `head_chars` bounds the preview in characters, not bytes.
    pub fn new(
        rel_path: impl Into<String>,
        content: impl Into<String>,
        head_chars: usize,
    ) -> Result<Self, IndexingError> {
        let rel_path = rel_path.into();
        let content = content.into();
        let markup = Markup::from_path(Path::new(&rel_path))
            .ok_or_else(|| IndexingError::UnsupportedFile(rel_path.clone()))?;

        let headings = markup.extract_headings(&content);
        let head = content.chars().take(head_chars).collect();

        Ok(Self {
            rel_path,
            content,
            head,
            headings,
        })
    }

    /// Length of the full content in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Options controlling how a directory is indexed.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub head_chars: usize,
    pub exclude: GlobSet,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            head_chars: 500,
            exclude: GlobSet::empty(),
        }
    }
}

/// All documents for one query, keyed by relative path.
#[derive(Debug, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    by_path: HashMap<String, usize>,
}

impl Corpus {
    /// Walk `root` and index every eligible file.
    pub fn index(root: &Path, options: &IndexOptions) -> Result<Self, IndexingError> {
        let files = list_files(root, &options.exclude)?;
        let corpus = Self::from_files(files, options.head_chars)?;
        info!(
            documents = corpus.len(),
            chars = corpus.total_chars(),
            "indexed {}",
            root.display()
        );
        Ok(corpus)
    }

    /// Build a corpus from already-loaded files.
    pub fn from_files(
        files: impl IntoIterator<Item = SourceFile>,
        head_chars: usize,
    ) -> Result<Self, IndexingError> {
        let documents = files
            .into_iter()
            .map(|f| Document::new(f.path, f.content, head_chars))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_documents(documents))
    }

    /// Build a corpus from documents. A later duplicate path replaces the earlier one.
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut deduped: Vec<Document> = Vec::with_capacity(documents.len());
        let mut by_path = HashMap::with_capacity(documents.len());
        for doc in documents {
            match by_path.get(&doc.rel_path) {
                Some(&idx) => deduped[idx] = doc,
                None => {
                    by_path.insert(doc.rel_path.clone(), deduped.len());
                    deduped.push(doc);
                }
            }
        }
        Self {
            documents: deduped,
            by_path,
        }
    }

    #[must_use]
    pub fn get(&self, rel_path: &str) -> Option<&Document> {
        self.by_path.get(rel_path).map(|&idx| &self.documents[idx])
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sum of every document's content length, in characters.
    #[must_use]
    pub fn total_chars(&self) -> usize {
        self.documents.iter().map(Document::char_len).sum()
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_document_headings_per_format() {
        let a = Document::new("a.md", "# Title\nfoo", 500).unwrap();
        let b = Document::new("b.adoc", "= Title\nbar", 500).unwrap();
        assert_eq!(a.headings, vec!["# Title"]);
        assert_eq!(b.headings, vec!["= Title"]);
    }

    #[test]
    fn test_head_is_bounded_by_chars() {
        let content = "é".repeat(20);
        let doc = Document::new("x.md", content.clone(), 5).unwrap();
        assert_eq!(doc.head, "ééééé");
        assert_eq!(doc.head.chars().count(), 5);

        let short = Document::new("y.md", "tiny", 500).unwrap();
        assert_eq!(short.head, "tiny");
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = Document::new("notes.txt", "hi", 10).unwrap_err();
        assert!(matches!(err, IndexingError::UnsupportedFile(_)));
    }

    #[test]
    fn test_total_chars_counts_characters() {
        let corpus = Corpus::from_documents(vec![
            Document::new("a.md", "abc", 500).unwrap(),
            Document::new("b.md", "日本語", 500).unwrap(),
        ]);
        assert_eq!(corpus.total_chars(), 6);
    }

    #[test]
    fn test_lookup_and_duplicates() {
        let corpus = Corpus::from_documents(vec![
            Document::new("a.md", "old", 500).unwrap(),
            Document::new("b.md", "b", 500).unwrap(),
            Document::new("a.md", "new", 500).unwrap(),
        ]);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("a.md").unwrap().content, "new");
        assert!(corpus.get("missing.md").is_none());
    }

    #[test]
    fn test_index_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.md"), "# Title\nfoo").unwrap();
        fs::write(dir.path().join("b.adoc"), "= Title\nbar").unwrap();
        fs::write(dir.path().join("ignored.txt"), "nope").unwrap();

        let corpus = Corpus::index(dir.path(), &IndexOptions::default()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("docs/a.md").unwrap().headings, vec!["# Title"]);
        assert_eq!(corpus.get("b.adoc").unwrap().headings, vec!["= Title"]);
    }

    #[test]
    fn test_empty_directory_gives_empty_corpus() {
        let dir = tempdir().unwrap();
        let corpus = Corpus::index(dir.path(), &IndexOptions::default()).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(corpus.total_chars(), 0);
    }
}
