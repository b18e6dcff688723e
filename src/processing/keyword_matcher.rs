//! Keyword and CTA matching over extracted document text

use crate::processing::phrases::PhraseTable;
use aho_corasick::{AhoCorasick, MatchKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an occurrence of a candidate is recognized in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Plain case-insensitive containment; "subscribers" contains "subscribe"
    #[default]
    Substring,
    /// Occurrence must not touch a letter or digit on either side
    WholeWord,
}

/// Occurrences found for one canonical phrase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub count: usize,
    /// Candidates seen at least once, in candidate order
    pub matched: Vec<String>,
}

/// Per-phrase results in phrase table order; every phrase is present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSet {
    pub results: Vec<PhraseMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMatch {
    pub phrase: String,
    #[serde(flatten)]
    pub result: MatchResult,
}

impl MatchSet {
    pub fn get(&self, phrase: &str) -> Option<&MatchResult> {
        self.results
            .iter()
            .find(|m| m.phrase == phrase)
            .map(|m| &m.result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MatchResult)> {
        self.results.iter().map(|m| (m.phrase.as_str(), &m.result))
    }

    pub fn total_count(&self) -> usize {
        self.results.iter().map(|m| m.result.count).sum()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    mode: MatchMode,
}

impl KeywordMatcher {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Count every candidate of every phrase in `text`.
    ///
    /// Text and candidates are lowercased before comparison. Each candidate
    /// is counted left to right without overlapping its own previous
    /// occurrence; different candidates may share text.
    pub fn match_phrases(&self, text: &str, table: &PhraseTable) -> MatchSet {
        let folded_text = text.to_lowercase();

        // Candidates shared between phrases are searched once
        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_ids: HashMap<String, usize> = HashMap::new();
        let candidates: Vec<Vec<&str>> = table.entries().iter().map(|e| e.candidates()).collect();

        for candidate in candidates.iter().flatten() {
            let folded = candidate.to_lowercase();
            if !pattern_ids.contains_key(&folded) {
                pattern_ids.insert(folded.clone(), patterns.len());
                patterns.push(folded);
            }
        }

        let pattern_counts = self.count_patterns(&folded_text, &patterns);

        let results = table
            .entries()
            .iter()
            .enumerate()
            .map(|(entry_idx, entry)| {
                let mut result = MatchResult::default();
                for candidate in &candidates[entry_idx] {
                    let id = pattern_ids[&candidate.to_lowercase()];
                    let count = pattern_counts[id];
                    if count > 0 {
                        result.count += count;
                        result.matched.push(candidate.to_string());
                    }
                }
                debug!("'{}': {} match(es)", entry.phrase, result.count);
                PhraseMatch {
                    phrase: entry.phrase.clone(),
                    result,
                }
            })
            .collect();

        MatchSet { results }
    }

    /// Non-overlapping occurrence count per pattern
    fn count_patterns(&self, folded_text: &str, patterns: &[String]) -> Vec<usize> {
        let mut counts = vec![0usize; patterns.len()];
        if patterns.is_empty() || folded_text.is_empty() {
            return counts;
        }

        let automaton = match AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(patterns)
        {
            Ok(automaton) => automaton,
            Err(e) => {
                warn!("Falling back to per-candidate scan: {}", e);
                return patterns
                    .iter()
                    .map(|p| self.count_single(folded_text, p))
                    .collect();
            }
        };

        // Overlapping search reports a given pattern in start order, so a
        // greedy filter reproduces a left-to-right non-overlapping count
        let mut next_allowed = vec![0usize; patterns.len()];
        for mat in automaton.find_overlapping_iter(folded_text) {
            let id = mat.pattern().as_usize();
            if mat.start() < next_allowed[id] {
                continue;
            }
            if self.mode == MatchMode::WholeWord
                && !is_word_bounded(folded_text, mat.start(), mat.end())
            {
                continue;
            }
            counts[id] += 1;
            next_allowed[id] = mat.end();
        }

        counts
    }

    fn count_single(&self, folded_text: &str, pattern: &str) -> usize {
        folded_text
            .match_indices(pattern)
            .filter(|(start, m)| {
                self.mode == MatchMode::Substring
                    || is_word_bounded(folded_text, *start, start + m.len())
            })
            .count()
    }
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
}
