/// Tag-delimited encodings of documents for inclusion in prompts.
///
/// Every embedded field is escaped so document text can never close or open
/// one of our tags.
use std::sync::LazyLock;

use regex::Regex;

use crate::corpus::Document;

static PATH_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<path>([^<]*)</path>").expect("valid path tag regex"));

/// Escape the characters that could be read as markup delimiters.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape`].
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Render a document's outline: path, headings and head preview.
#[must_use]
pub fn encode_outline(doc: &Document) -> String {
    let mut block = String::from("<outline>\n");
    block.push_str(&format!("<path>{}</path>\n", escape(&doc.rel_path)));
    block.push_str("<headings>\n");
    for heading in &doc.headings {
        block.push_str(&escape(heading));
        block.push('\n');
    }
    block.push_str("</headings>\n");
    block.push_str(&format!("<head>\n{}\n</head>\n", escape(&doc.head)));
    block.push_str("</outline>");
    block
}

/// Render outlines for a set of documents, one block per document.
pub fn encode_outlines<'a>(docs: impl IntoIterator<Item = &'a Document>) -> String {
    docs.into_iter()
        .map(encode_outline)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a document's full content for the answer stage.
#[must_use]
pub fn encode_document(doc: &Document) -> String {
    format!(
        "<document path=\"{}\">\n{}\n</document>",
        escape(&doc.rel_path),
        escape(&doc.content)
    )
}

/// Extract the (unescaped) path from an encoded outline block.
#[must_use]
pub fn extract_path(block: &str) -> Option<String> {
    PATH_TAG.captures(block).map(|caps| unescape(&caps[1]))
}
