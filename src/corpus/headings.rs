use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+.*").expect("valid markdown heading regex"));
static ASCIIDOC_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=+\s+.*").expect("valid asciidoc heading regex"));

/// Markup formats the indexer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    Markdown,
    AsciiDoc,
}

impl Markup {
    /// Every extension the indexer picks up, in lowercase.
    pub const EXTENSIONS: &'static [&'static str] = &["md", "markdown", "adoc", "asciidoc"];

    /// Detect the markup format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "adoc" | "asciidoc" => Some(Self::AsciiDoc),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Markdown => &MARKDOWN_HEADING,
            Self::AsciiDoc => &ASCIIDOC_HEADING,
        }
    }

    /// Collect heading lines in document order, trimmed.
    pub fn extract_headings(self, content: &str) -> Vec<String> {
        let pattern = self.pattern();
        content
            .lines()
            .filter(|line| pattern.is_match(line))
            .map(|line| line.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_headings() {
        let headings = Markup::Markdown.extract_headings("# Title\nfoo\n## Sub  \nbar");
        assert_eq!(headings, vec!["# Title", "## Sub"]);
    }

    #[test]
    fn test_asciidoc_headings() {
        let headings = Markup::AsciiDoc.extract_headings("= Title\nbar\n== Section\n");
        assert_eq!(headings, vec!["= Title", "== Section"]);
    }

    #[test]
    fn test_heading_requires_whitespace() {
        // Hashtags and attribute lines are not headings
        let md = Markup::Markdown.extract_headings("#hashtag\n #indented\n# Real");
        assert_eq!(md, vec!["# Real"]);

        let adoc = Markup::AsciiDoc.extract_headings("==not\n= Real\n====");
        assert_eq!(adoc, vec!["= Real"]);
    }

    #[test]
    fn test_patterns_do_not_cross_formats() {
        assert!(Markup::Markdown.extract_headings("= Title").is_empty());
        assert!(Markup::AsciiDoc.extract_headings("# Title").is_empty());
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Markup::from_extension("md"), Some(Markup::Markdown));
        assert_eq!(Markup::from_extension("MD"), Some(Markup::Markdown));
        assert_eq!(Markup::from_extension("adoc"), Some(Markup::AsciiDoc));
        assert_eq!(Markup::from_extension("asciidoc"), Some(Markup::AsciiDoc));
        assert_eq!(Markup::from_extension("txt"), None);
        assert_eq!(Markup::from_path(Path::new("docs/a.rst")), None);
        assert!(
            Markup::EXTENSIONS
                .iter()
                .all(|ext| Markup::from_extension(ext).is_some())
        );
    }
}
