//! Output formatters for scan reports

use crate::config::OutputFormat;
use crate::error::Result;
use crate::output::report::ScanReport;
use std::path::Path;

/// Trait for rendering a scan report
pub trait OutputFormatter {
    fn format_report(&self, report: &ScanReport) -> Result<String>;
}

/// Plain-text report, identical on stdout and on disk
pub struct TextFormatter {
    detailed: bool,
}

/// JSON formatter for downstream tooling
pub struct JsonFormatter {
    pretty: bool,
}

impl TextFormatter {
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }
}

impl OutputFormatter for TextFormatter {
    fn format_report(&self, report: &ScanReport) -> Result<String> {
        let mut out = format_text(report);
        if self.detailed {
            out.push_str(&format_details(report));
        }
        Ok(out)
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &ScanReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(serde_json::to_string(report)?)
        }
    }
}

/// The report layout: model timing, keyword matches, similarity matches,
/// then the raw model output
pub fn format_text(report: &ScanReport) -> String {
    let mut out = String::new();

    if let Some(secs) = report.model_duration_secs() {
        out.push_str(&format!("Model Response Time: {:.2} seconds\n\n", secs));
    }

    out.push_str("Keyword Matches:\n");
    for (phrase, result) in report.matches.iter() {
        out.push_str(&format!(
            "- {}: {} match(es) ({})\n",
            phrase,
            result.count,
            result.matched.join(", ")
        ));
    }

    if let Some(similarity) = &report.similarity {
        out.push_str(&format!(
            "\nSimilarity Matches (threshold {:.2}):\n",
            similarity.threshold
        ));
        if similarity.matches.is_empty() {
            out.push_str("- none\n");
        }
        for m in &similarity.matches {
            out.push_str(&format!("- {}: {:.4}\n", m.candidate, m.similarity));
        }
    }

    if let Some(inference) = &report.inference {
        out.push_str("\nModel Output:\n");
        out.push_str(&inference.text);
        out.push('\n');
    }

    out
}

fn format_details(report: &ScanReport) -> String {
    let mut out = String::from("\nScan Details:\n");
    out.push_str(&format!("- source: {}\n", report.source.display()));
    out.push_str(&format!("- file type: {}\n", report.file_type));
    out.push_str(&format!("- words: {}\n", report.word_count));
    out.push_str(&format!("- backend: {}\n", report.backend));
    out.push_str(&format!("- total matches: {}\n", report.total_matches()));
    if let Some(inference) = &report.inference {
        out.push_str(&format!("- generated tokens: {}\n", inference.token_count));
    }
    out.push_str(&format!(
        "- generated at: {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

/// Report generator that picks the formatter for a format
pub struct ReportGenerator {
    text_formatter: TextFormatter,
    json_formatter: JsonFormatter,
}

impl ReportGenerator {
    pub fn new(detailed: bool) -> Self {
        Self {
            text_formatter: TextFormatter::new(detailed),
            json_formatter: JsonFormatter::new(true),
        }
    }

    pub fn generate_report(&self, report: &ScanReport, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => self.text_formatter.format_report(report),
            OutputFormat::Json => self.json_formatter.format_report(report),
        }
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(false)
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    use std::fs;
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(file_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::file_detector::FileType;
    use crate::llm::invoker::InferenceResult;
    use crate::processing::keyword_matcher::{MatchResult, MatchSet, PhraseMatch};
    use crate::processing::similarity::{SimilarityMatch, SimilarityResult};
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn report() -> ScanReport {
        let phrase = |name: &str, count: usize, matched: &[&str]| PhraseMatch {
            phrase: name.to_string(),
            result: MatchResult {
                count,
                matched: matched.iter().map(|s| s.to_string()).collect(),
            },
        };

        ScanReport {
            source: PathBuf::from("transcription.txt"),
            file_type: FileType::PlainText,
            word_count: 12,
            generated_at: Utc::now(),
            backend: "none".to_string(),
            matches: MatchSet {
                results: vec![
                    phrase("buy", 2, &["buy", "go purchase"]),
                    phrase("subscribe", 0, &[]),
                ],
            },
            inference: None,
            similarity: None,
        }
    }

    #[test]
    fn test_keyword_lines_without_model() {
        assert_eq!(
            format_text(&report()),
            "Keyword Matches:\n\
             - buy: 2 match(es) (buy, go purchase)\n\
             - subscribe: 0 match(es) ()\n"
        );
    }

    #[test]
    fn test_generative_report_layout() {
        let mut report = report();
        report.inference = Some(InferenceResult {
            text: "The text urges the reader to buy.".to_string(),
            duration_secs: 1.234,
            token_count: 9,
        });

        let text = format_text(&report);
        assert!(text.starts_with("Model Response Time: 1.23 seconds\n\nKeyword Matches:\n"));
        assert!(text.ends_with("\nModel Output:\nThe text urges the reader to buy.\n"));
    }

    #[test]
    fn test_similarity_section() {
        let mut report = report();
        report.similarity = Some(SimilarityResult {
            threshold: 0.8,
            matches: vec![SimilarityMatch {
                candidate: "buy now".to_string(),
                similarity: 0.91234,
            }],
            duration_secs: 0.5,
        });

        let text = format_text(&report);
        assert!(text.starts_with("Model Response Time: 0.50 seconds\n"));
        assert!(text.contains("\nSimilarity Matches (threshold 0.80):\n- buy now: 0.9123\n"));

        report.similarity.as_mut().unwrap().matches.clear();
        assert!(format_text(&report).ends_with("(threshold 0.80):\n- none\n"));
    }

    #[test]
    fn test_detailed_text_appends_details() {
        let text = TextFormatter::new(true).format_report(&report()).unwrap();
        assert!(text.contains("\nScan Details:\n- source: transcription.txt\n"));
        assert!(text.contains("- total matches: 2\n"));
    }

    #[test]
    fn test_json_report() {
        let json = ReportGenerator::default()
            .generate_report(&report(), OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matches"]["results"][0]["phrase"], "buy");
        assert_eq!(value["matches"]["results"][0]["count"], 2);
        assert!(value.get("inference").is_none());
    }

    #[test]
    fn test_save_report_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("scan.txt");
        save_report_to_file("Keyword Matches:\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Keyword Matches:\n");
    }
}
