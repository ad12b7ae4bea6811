use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use raggedy::answer::DocumentMode;
use raggedy::config::Config;
use raggedy::corpus::Corpus;
use raggedy::llm::{Provider, build_client};
use raggedy::outline;
use raggedy::pipeline::Pipeline;
use raggedy::render::TerminalRenderer;

/// Ask questions about a directory of Markdown and AsciiDoc documents.
#[derive(Parser, Debug)]
#[command(name = "raggedy", author, version, about)]
struct Cli {
    /// Config file (default: ./raggedy.json, then the user config dir).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a question from the documents under DIR.
    Ask {
        /// Directory to index.
        dir: PathBuf,

        /// The question (multiple words are joined).
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[arg(long, value_enum)]
        provider: Option<Provider>,

        /// Model for the answer (and selection, unless --selector-model is set).
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        selector_model: Option<String>,

        /// Send the whole corpus when it is at most this many characters.
        #[arg(long, value_name = "CHARS")]
        threshold: Option<usize>,

        /// Most documents the selector may pick.
        #[arg(long, value_name = "N")]
        max_docs: Option<usize>,

        /// Put documents in the user turn instead of separate cacheable blocks.
        #[arg(long)]
        inline: bool,

        /// Hide the progress spinner.
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the index built for DIR.
    Index {
        dir: PathBuf,

        #[arg(long, value_enum, default_value_t = IndexFormat::Json)]
        format: IndexFormat,

        /// Include full document content in JSON output.
        #[arg(long)]
        full: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexFormat {
    Json,
    Outline,
}

#[derive(Serialize)]
struct IndexEntry<'a> {
    rel_path: &'a str,
    head: &'a str,
    headings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "raggedy=info",
        _ => "raggedy=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ask {
            dir,
            question,
            provider,
            model,
            selector_model,
            threshold,
            max_docs,
            inline,
            no_progress,
        } => {
            if let Some(provider) = provider {
                config.provider = provider;
            }
            if let Some(model) = model {
                config.model = Some(model);
            }
            if selector_model.is_some() {
                config.selector_model = selector_model;
            }
            if let Some(threshold) = threshold {
                config.full_corpus_threshold = threshold;
            }
            if let Some(max_docs) = max_docs {
                config.max_selected = max_docs;
            }
            if inline {
                config.document_mode = Some(DocumentMode::Inline);
            }
            config.validate().context("invalid configuration")?;

            let question = question.join(" ");
            let corpus = Corpus::index(&dir, &config.index_options()?)
                .with_context(|| format!("failed to index {}", dir.display()))?;

            let selector_client = build_client(&config, config.selector_model())?;
            let answer_client = build_client(&config, config.model())?;
            let renderer = TerminalRenderer::new(!no_progress);

            let pipeline = Pipeline::new(
                selector_client.as_ref(),
                answer_client.as_ref(),
                config.price_table(),
                config.pipeline_options(),
                &renderer,
            )?;
            pipeline.ask(&corpus, &question).await?;
        }

        Command::Index { dir, format, full } => {
            let corpus = Corpus::index(&dir, &config.index_options()?)
                .with_context(|| format!("failed to index {}", dir.display()))?;

            match format {
                IndexFormat::Json => {
                    let entries: Vec<IndexEntry<'_>> = corpus
                        .iter()
                        .map(|doc| IndexEntry {
                            rel_path: &doc.rel_path,
                            head: &doc.head,
                            headings: &doc.headings,
                            content: full.then_some(doc.content.as_str()),
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                IndexFormat::Outline => {
                    println!("{}", outline::encode_outlines(&corpus));
                }
            }
        }
    }

    Ok(())
}
