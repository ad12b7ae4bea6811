//! # raggedy: ask questions about a directory of documents
//!
//! Indexes Markdown and AsciiDoc files into lightweight outlines, lets a model
//! pick the few documents that matter, then asks it to answer from their full
//! text. Small corpora skip the selection step and are sent whole.
//!
//! ## Architecture
//!
//! - **[`corpus`]**: Directory walk, heading extraction, [`corpus::Document`] / [`corpus::Corpus`]
//! - **[`outline`]**: Tag-delimited, escaped prompt encodings of documents
//! - **[`router`]**: Full-corpus vs. selection decision by total size
//! - **[`selector`]**: Outline-based relevance selection and response parsing
//! - **[`answer`]**: Final answer call over the chosen documents
//! - **[`llm`]**: Model call capability with Anthropic, OpenAI and mock clients
//! - **[`usage`]**: Token usage, price table, cost and metadata formatting
//! - **[`pipeline`]**: Orchestration and the error taxonomy
//! - **[`render`]**: Markdown output sink and progress spinner
//! - **[`config`]**: JSON config, environment overrides, validation

pub mod answer;
pub mod config;
pub mod corpus;
pub mod llm;
pub mod outline;
pub mod pipeline;
pub mod render;
pub mod router;
pub mod selector;
pub mod usage;

pub use pipeline::{Outcome, Pipeline, PipelineError, PipelineOptions};
