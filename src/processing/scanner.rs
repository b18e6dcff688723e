//! End-to-end scan of one document

use crate::error::Result;
use crate::input::manager::{ExtractedDocument, InputManager};
use crate::llm::invoker::ModelBackend;
use crate::llm::prompts::build_prompt;
use crate::output::report::ScanReport;
use crate::processing::keyword_matcher::KeywordMatcher;
use crate::processing::phrases::PhraseTable;
use crate::processing::similarity::match_by_similarity;
use chrono::Utc;
use log::info;
use std::path::Path;

/// Extract, match keywords, then hand the same text to the model backend
pub struct Scanner {
    table: PhraseTable,
    matcher: KeywordMatcher,
    backend: ModelBackend,
    input: InputManager,
}

impl Scanner {
    pub fn new(table: PhraseTable, matcher: KeywordMatcher, backend: ModelBackend) -> Self {
        Self {
            table,
            matcher,
            backend,
            input: InputManager::new(),
        }
    }

    pub fn table(&self) -> &PhraseTable {
        &self.table
    }

    pub fn backend(&self) -> &ModelBackend {
        &self.backend
    }

    /// A missing input fails before the backend is touched
    pub async fn scan(&mut self, path: &Path) -> Result<ScanReport> {
        let document = self.input.extract(path).await?;
        info!(
            "Extracted {} characters from {} ({})",
            document.char_count(),
            path.display(),
            document.file_type
        );
        self.scan_document(document).await
    }

    pub async fn scan_document(&mut self, document: ExtractedDocument) -> Result<ScanReport> {
        let matches = self.matcher.match_phrases(&document.text, &self.table);
        let word_count = document.word_count();
        info!("Keyword matcher found {} occurrences", matches.total_count());

        let mut inference = None;
        let mut similarity = None;

        match &mut self.backend {
            ModelBackend::Generative(invoker, config) => {
                let prompt = build_prompt(&self.table, &document.text)?;
                info!("Running {} on a {}-char prompt", invoker.name(), prompt.len());
                inference = Some(invoker.infer(&prompt, config).await?);
            }
            ModelBackend::Embedding { embedder, threshold } => {
                let candidates = self.table.all_candidates();
                let result =
                    match_by_similarity(&document.text, &candidates, &**embedder, *threshold)?;
                info!(
                    "{} of {} candidates passed similarity {:.2}",
                    result.matches.len(),
                    candidates.len(),
                    threshold
                );
                similarity = Some(result);
            }
            ModelBackend::Disabled => {}
        }

        Ok(ScanReport {
            source: document.path,
            file_type: document.file_type,
            word_count,
            generated_at: Utc::now(),
            backend: self.backend.label(),
            matches,
            inference,
            similarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::llm::invoker::{InferenceConfig, InferenceResult, ModelInvoker};
    use crate::processing::phrases::{default_cta_table, PhraseEntry};
    use crate::processing::similarity::Embedder;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records every prompt it receives
    struct RecordingInvoker {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ModelInvoker for RecordingInvoker {
        fn name(&self) -> &str {
            "recording"
        }

        async fn infer(&mut self, prompt: &str, _config: &InferenceConfig) -> Result<InferenceResult> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(InferenceResult {
                text: "looks promotional".to_string(),
                duration_secs: 0.25,
                token_count: 2,
            })
        }
    }

    /// Every text maps to the same direction
    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5, 0.5])
        }
    }

    fn recording_scanner() -> (Scanner, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let backend = ModelBackend::Generative(
            Box::new(RecordingInvoker {
                prompts: Arc::clone(&prompts),
            }),
            InferenceConfig::local_default(),
        );
        let scanner = Scanner::new(default_cta_table(), KeywordMatcher::default(), backend);
        (scanner, prompts)
    }

    #[tokio::test]
    async fn test_missing_file_never_reaches_model() {
        let temp_dir = TempDir::new().unwrap();
        let (mut scanner, prompts) = recording_scanner();

        let err = scanner
            .scan(&temp_dir.path().join("missing.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::FileNotFound(_)));
        assert!(prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generative_scan_uses_raw_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transcription.txt");
        std::fs::write(&path, "Please buy now and subscribe today.").unwrap();
        let (mut scanner, prompts) = recording_scanner();

        let report = scanner.scan(&path).await.unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("Text: Please buy now and subscribe today."));
        assert_eq!(report.backend, "recording");
        assert_eq!(report.matches.get("subscribe").unwrap().count, 1);
        assert_eq!(report.inference.unwrap().text, "looks promotional");
        assert!(report.similarity.is_none());
    }

    #[tokio::test]
    async fn test_embedding_backend_scores_all_candidates() {
        let table = PhraseTable::new(vec![PhraseEntry::new("buy", vec!["purchase".into()])]);
        let backend = ModelBackend::Embedding {
            embedder: Box::new(ConstantEmbedder),
            threshold: 1.0,
        };
        let mut scanner = Scanner::new(table, KeywordMatcher::default(), backend);

        let document = ExtractedDocument {
            path: "inline.txt".into(),
            file_type: crate::input::FileType::PlainText,
            text: "nothing here".to_string(),
        };
        let report = scanner.scan_document(document).await.unwrap();

        let similarity = report.similarity.unwrap();
        assert_eq!(similarity.matches.len(), 2);
        assert!(report.inference.is_none());
        assert_eq!(report.matches.get("buy").unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_disabled_backend_reports_matches_only() {
        let mut scanner =
            Scanner::new(default_cta_table(), KeywordMatcher::default(), ModelBackend::Disabled);
        let document = ExtractedDocument {
            path: "inline.txt".into(),
            file_type: crate::input::FileType::PlainText,
            text: String::new(),
        };

        let report = scanner.scan_document(document).await.unwrap();
        assert_eq!(report.backend, "none");
        assert_eq!(report.matches.len(), 3);
        assert!(report.model_duration_secs().is_none());
    }
}
