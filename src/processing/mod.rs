//! Phrase expansion, keyword matching and the scan pipeline

pub mod embeddings;
pub mod keyword_matcher;
pub mod phrases;
pub mod scanner;
pub mod similarity;
pub mod synonyms;

pub use keyword_matcher::{KeywordMatcher, MatchMode, MatchResult, MatchSet};
pub use phrases::{PhraseEntry, PhraseTable};
pub use scanner::Scanner;
