//! CLI interface for the CTA scanner

use crate::config::{BackendKind, Config, OutputFormat};
use crate::processing::keyword_matcher::MatchMode;
use crate::processing::synonyms::SynonymStrategy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cta-scanner")]
#[command(about = "Keyword and call-to-action scanner for documents")]
#[command(long_about = "Count keywords, call-to-action phrases and their synonyms in a text, PDF or DOCX document, and ask a local, hosted or embedding model for a second opinion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a document for keywords and CTA phrases
    Scan(ScanArgs),

    /// Model management commands
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScanArgs {
    /// Document to scan (TXT, PDF, DOCX; anything else is read as raw text)
    pub file: PathBuf,

    /// Comma-separated phrases to look for instead of the configured table
    #[arg(short, long)]
    pub phrases: Option<String>,

    /// Synonym source: static, wordnet, none
    #[arg(short, long, value_parser = parse_synonym_strategy)]
    pub synonyms: Option<SynonymStrategy>,

    /// WordNet dictionary directory for --synonyms wordnet
    #[arg(long)]
    pub wordnet_dir: Option<PathBuf>,

    /// Model backend: local, hosted, embedding, none
    #[arg(short, long, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Model id, weights file, or hosted model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Tokenizer file for a local weights path
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Nucleus sampling cutoff
    #[arg(long)]
    pub top_p: Option<f64>,

    /// Minimum cosine similarity for the embedding backend
    #[arg(long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,

    /// Only count occurrences that stand as whole words
    #[arg(long)]
    pub whole_word: bool,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: text, json
    #[arg(short, long, value_parser = parse_output_format)]
    pub format: Option<OutputFormat>,

    /// Append scan details to the text report
    #[arg(short, long)]
    pub detailed: bool,
}

impl ScanArgs {
    /// Command-line flags take precedence over the loaded config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(strategy) = self.synonyms {
            config.matching.synonyms = strategy;
        }
        if let Some(dir) = &self.wordnet_dir {
            config.matching.wordnet_dir = Some(dir.clone());
        }
        if self.whole_word {
            config.matching.mode = MatchMode::WholeWord;
        }
        if let Some(tokenizer) = &self.tokenizer {
            config.local.tokenizer = Some(tokenizer.clone());
        }
        if let Some(threshold) = self.threshold {
            config.similarity.threshold = threshold;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }

        for inference in [&mut config.local.inference, &mut config.hosted.inference] {
            if let Some(max_tokens) = self.max_tokens {
                inference.max_tokens = max_tokens;
            }
            if let Some(temperature) = self.temperature {
                inference.temperature = temperature;
            }
            if let Some(top_p) = self.top_p {
                inference.top_p = top_p;
            }
        }
    }
}

#[derive(Subcommand)]
pub enum ModelAction {
    /// List available models
    List,

    /// Download a model
    Download {
        /// Model id from `models list`
        model: String,

        /// Force re-download if model exists
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a downloaded model
    Remove {
        /// Model id to remove
        model: String,
    },

    /// Show model information
    Info {
        /// Model id
        model: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "text" | "txt" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!("Invalid output format: {}. Supported: text, json", format)),
    }
}

pub fn parse_backend(backend: &str) -> Result<BackendKind, String> {
    match backend.to_lowercase().as_str() {
        "local" => Ok(BackendKind::Local),
        "hosted" | "remote" => Ok(BackendKind::Hosted),
        "embedding" | "similarity" => Ok(BackendKind::Embedding),
        "none" | "off" => Ok(BackendKind::None),
        _ => Err(format!(
            "Invalid backend: {}. Supported: local, hosted, embedding, none",
            backend
        )),
    }
}

pub fn parse_synonym_strategy(strategy: &str) -> Result<SynonymStrategy, String> {
    strategy.parse()
}
