//! Prompt construction for the generative backends

use crate::error::Result;
use crate::processing::phrases::PhraseTable;
use log::debug;
use serde::{Deserialize, Serialize};

/// Prompt template with `{phrases}` and `{text}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub keyword_analysis: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            keyword_analysis: KEYWORD_ANALYSIS_TEMPLATE.to_string(),
        }
    }
}

/// Parameters for prompt template substitution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    /// JSON object of canonical phrases to their synonyms
    pub phrases_json: String,
    pub text: String,
}

impl PromptParams {
    pub fn new(table: &PhraseTable, text: &str) -> Result<Self> {
        Ok(Self {
            phrases_json: table.to_json()?,
            text: text.to_string(),
        })
    }
}

impl PromptTemplates {
    /// Substitute both placeholders in a single pass so document text that
    /// happens to contain `{phrases}` is left alone
    pub fn render_keyword_analysis(&self, params: &PromptParams) -> String {
        let mut prompt = String::with_capacity(
            self.keyword_analysis.len() + params.phrases_json.len() + params.text.len(),
        );
        let mut rest = self.keyword_analysis.as_str();

        while let Some(open) = rest.find('{') {
            prompt.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix("{phrases}") {
                prompt.push_str(&params.phrases_json);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{text}") {
                prompt.push_str(&params.text);
                rest = after;
            } else {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
        prompt.push_str(rest);

        debug!("Prompt length: {} chars", prompt.len());
        prompt
    }
}

/// Build the default prompt for a phrase table and document text
pub fn build_prompt(table: &PhraseTable, text: &str) -> Result<String> {
    let params = PromptParams::new(table, text)?;
    Ok(PromptTemplates::default().render_keyword_analysis(&params))
}

const KEYWORD_ANALYSIS_TEMPLATE: &str =
    "Analyze the following text for keywords and call-to-action phrases:\n{phrases}\nText: {text}";
