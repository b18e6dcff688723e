//! Canonical phrases and their synonym candidates

use crate::error::Result;
use crate::processing::synonyms::SynonymExpander;
use log::debug;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// A canonical keyword or CTA phrase with its alternate phrasings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub phrase: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl PhraseEntry {
    pub fn new(phrase: impl Into<String>, synonyms: Vec<String>) -> Self {
        Self {
            phrase: phrase.into(),
            synonyms,
        }
    }

    /// The canonical phrase followed by its synonyms.
    ///
    /// Duplicates are removed case-insensitively (first spelling wins) and
    /// empty strings are skipped, so every candidate is searched once.
    pub fn candidates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.phrase.as_str())
            .chain(self.synonyms.iter().map(|s| s.as_str()))
            .filter(|candidate| !candidate.is_empty())
            .filter(|candidate| seen.insert(candidate.to_lowercase()))
            .collect()
    }
}

/// Ordered phrase table; order is the report order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseTable {
    entries: Vec<PhraseEntry>,
}

impl PhraseTable {
    pub fn new(entries: Vec<PhraseEntry>) -> Self {
        Self { entries }
    }

    /// Expand every canonical phrase through the given synonym source
    pub fn build<S: AsRef<str>>(phrases: &[S], expander: &dyn SynonymExpander) -> Result<Self> {
        let mut entries = Vec::with_capacity(phrases.len());
        for phrase in phrases {
            let phrase = phrase.as_ref();
            let synonyms = expander.expand(phrase)?;
            debug!("Expanded '{}' into {} synonyms", phrase, synonyms.len());
            entries.push(PhraseEntry::new(phrase, synonyms));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PhraseEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PhraseEntry> {
        self.entries
    }

    /// Every candidate of every entry, in table order, without repeats
    pub fn all_candidates(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .flat_map(|e| e.candidates())
            .filter(|c| seen.insert(c.to_lowercase()))
            .map(|c| c.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serialized as `{"phrase": ["synonym", ...]}` keeping table order
impl Serialize for PhraseTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.phrase, &entry.synonyms)?;
        }
        map.end()
    }
}

/// Split a user-supplied comma-separated phrase list
pub fn parse_phrase_list(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.to_lowercase()))
        .map(|p| p.to_string())
        .collect()
}

/// Built-in keyword and CTA table
pub fn default_cta_table() -> PhraseTable {
    let entry = |phrase: &str, synonyms: &[&str]| {
        PhraseEntry::new(phrase, synonyms.iter().map(|s| s.to_string()).collect())
    };

    PhraseTable::new(vec![
        entry("buy", &["go purchase", "go order now", "go acquire"]),
        entry("subscribe", &["check now", "get it for yourself", "enroll"]),
        entry("call to action", &["buy now", "click here", "get yours"]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::synonyms::StaticSynonyms;

    #[test]
    fn test_candidates_start_with_canonical_phrase() {
        let entry = PhraseEntry::new("buy", vec!["purchase".into(), "BUY".into(), "".into()]);
        assert_eq!(entry.candidates(), vec!["buy", "purchase"]);
    }

    #[test]
    fn test_table_serializes_in_order() {
        let json = default_cta_table().to_json().unwrap();
        let buy = json.find("\"buy\"").unwrap();
        let subscribe = json.find("\"subscribe\"").unwrap();
        let cta = json.find("\"call to action\"").unwrap();
        assert!(buy < subscribe && subscribe < cta);
        assert!(json.starts_with("{\"buy\":[\"go purchase\""));
    }

    #[test]
    fn test_parse_phrase_list() {
        let phrases = parse_phrase_list(" buy now, subscribe ,, Buy Now,click here ");
        assert_eq!(phrases, vec!["buy now", "subscribe", "click here"]);
        assert!(parse_phrase_list(" , ").is_empty());
    }

    #[test]
    fn test_build_uses_expander() {
        let expander = StaticSynonyms::new(default_cta_table().into_entries());
        let table = PhraseTable::build(&["subscribe", "free trial"], &expander).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[0].synonyms.len(), 3);
        assert!(table.entries()[1].synonyms.is_empty());
        assert_eq!(table.entries()[1].candidates(), vec!["free trial"]);
    }

    #[test]
    fn test_all_candidates_dedups_across_entries() {
        let table = PhraseTable::new(vec![
            PhraseEntry::new("buy", vec!["buy now".into()]),
            PhraseEntry::new("call to action", vec!["Buy Now".into()]),
        ]);
        assert_eq!(table.all_candidates(), vec!["buy", "buy now", "call to action"]);
    }
}
