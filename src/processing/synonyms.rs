//! Synonym expansion for canonical phrases
//!
//! Two sources are supported: a static hand-authored table and a WordNet
//! dictionary on disk. Both return an ordered, de-duplicated list and treat
//! an unknown phrase as having no synonyms.

use crate::error::{Result, ScanError};
use crate::processing::phrases::PhraseEntry;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub trait SynonymExpander {
    /// Related phrasings of `phrase`; empty when nothing is known about it
    fn expand(&self, phrase: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynonymStrategy {
    Static,
    WordNet,
    None,
}

impl std::str::FromStr for SynonymStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" | "table" => Ok(SynonymStrategy::Static),
            "wordnet" | "thesaurus" => Ok(SynonymStrategy::WordNet),
            "none" | "off" => Ok(SynonymStrategy::None),
            _ => Err(format!(
                "Invalid synonym strategy: {}. Supported: static, wordnet, none",
                s
            )),
        }
    }
}

/// Build the expander selected by `strategy`
pub fn build_expander(
    strategy: SynonymStrategy,
    table: &[PhraseEntry],
    wordnet_dir: Option<&Path>,
) -> Result<Box<dyn SynonymExpander>> {
    match strategy {
        SynonymStrategy::Static => Ok(Box::new(StaticSynonyms::new(table.to_vec()))),
        SynonymStrategy::WordNet => {
            let dir = wordnet_dir.ok_or_else(|| {
                ScanError::Configuration(
                    "WordNet synonyms need matching.wordnet_dir or --wordnet-dir".to_string(),
                )
            })?;
            Ok(Box::new(WordNetSynonyms::open(dir)?))
        }
        SynonymStrategy::None => Ok(Box::new(NoSynonyms)),
    }
}

fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Fixed lookup table keyed by canonical phrase
pub struct StaticSynonyms {
    table: HashMap<String, Vec<String>>,
}

impl StaticSynonyms {
    pub fn new(entries: Vec<PhraseEntry>) -> Self {
        let table = entries
            .into_iter()
            .map(|entry| (normalize_key(&entry.phrase), dedup_in_order(entry.synonyms)))
            .collect();
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn normalize_key(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

impl SynonymExpander for StaticSynonyms {
    fn expand(&self, phrase: &str) -> Result<Vec<String>> {
        Ok(self
            .table
            .get(&normalize_key(phrase))
            .cloned()
            .unwrap_or_default())
    }
}

/// Canonical phrase only
pub struct NoSynonyms;

impl SynonymExpander for NoSynonyms {
    fn expand(&self, _phrase: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Lemma lookup against a WordNet `dict/` directory
pub struct WordNetSynonyms {
    dict_dir: PathBuf,
}

/// WordNet part-of-speech file suffixes, in lookup order
const WORDNET_POS: [&str; 4] = ["noun", "verb", "adj", "adv"];

impl WordNetSynonyms {
    /// Accepts either the `dict` directory itself or a WordNet home containing it
    pub fn open(dir: &Path) -> Result<Self> {
        let nested = dir.join("dict");
        let dict_dir = if nested.join("index.noun").exists() {
            nested
        } else {
            dir.to_path_buf()
        };

        let has_index = WORDNET_POS
            .iter()
            .any(|pos| dict_dir.join(format!("index.{}", pos)).exists());
        if !has_index {
            return Err(ScanError::Configuration(format!(
                "No WordNet index files found in {}",
                dict_dir.display()
            )));
        }

        info!("Using WordNet dictionary at {}", dict_dir.display());
        Ok(Self { dict_dir })
    }

    /// Synset offsets listed for `lemma` in `index.<pos>`
    fn synset_offsets(&self, pos: &str, lemma: &str) -> Result<Vec<u64>> {
        let path = self.dict_dir.join(format!("index.{}", pos));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let prefix = format!("{} ", lemma);

        for line in reader.lines() {
            let line = line?;
            // License header lines are indented
            if line.starts_with(' ') || !line.starts_with(&prefix) {
                continue;
            }
            return parse_index_line(&line).ok_or_else(|| {
                ScanError::Thesaurus(format!("Malformed entry for '{}' in {}", lemma, path.display()))
            });
        }

        Ok(Vec::new())
    }

    /// Lemma names of the synset stored at `offset` in `data.<pos>`
    fn synset_lemmas(&self, pos: &str, offset: u64) -> Result<Vec<String>> {
        let path = self.dict_dir.join(format!("data.{}", pos));
        let mut file = File::open(&path).map_err(|e| {
            ScanError::Thesaurus(format!("Failed to open {}: {}", path.display(), e))
        })?;
        file.seek(SeekFrom::Start(offset))?;

        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;

        parse_data_line(&line).ok_or_else(|| {
            ScanError::Thesaurus(format!(
                "Malformed synset at offset {} in {}",
                offset,
                path.display()
            ))
        })
    }
}

impl SynonymExpander for WordNetSynonyms {
    fn expand(&self, phrase: &str) -> Result<Vec<String>> {
        let lemma = phrase.trim().to_lowercase().replace(' ', "_");
        if lemma.is_empty() {
            return Ok(Vec::new());
        }

        let mut lemmas = Vec::new();
        for pos in WORDNET_POS {
            for offset in self.synset_offsets(pos, &lemma)? {
                lemmas.extend(self.synset_lemmas(pos, offset)?);
            }
        }

        let synonyms = dedup_in_order(lemmas);
        debug!("WordNet returned {} lemmas for '{}'", synonyms.len(), phrase);
        Ok(synonyms)
    }
}

/// `lemma pos synset_cnt p_cnt [ptr_symbol...] sense_cnt tagsense_cnt synset_offset...`
fn parse_index_line(line: &str) -> Option<Vec<u64>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let synset_cnt: usize = fields.get(2)?.parse().ok()?;
    let p_cnt: usize = fields.get(3)?.parse().ok()?;
    let offsets_start = 4 + p_cnt + 2;

    fields
        .get(offsets_start..offsets_start + synset_cnt)?
        .iter()
        .map(|f| f.parse().ok())
        .collect()
}

/// `offset lex_filenum ss_type w_cnt word lex_id [word lex_id...] ...`
fn parse_data_line(line: &str) -> Option<Vec<String>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let w_cnt = usize::from_str_radix(fields.get(3)?, 16).ok()?;

    (0..w_cnt)
        .map(|i| fields.get(4 + i * 2).map(|word| lemma_display(word)))
        .collect()
}

/// Strip adjective markers like `(a)` and turn underscores back into spaces
fn lemma_display(word: &str) -> String {
    let word = match word.find('(') {
        Some(idx) if word.ends_with(')') => &word[..idx],
        _ => word,
    };
    word.replace('_', " ")
}
