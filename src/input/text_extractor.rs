//! Text extraction from various file formats

use crate::error::{Result, ScanError};
use log::{debug, warn};
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use std::path::Path;
use tokio::fs;

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        // Invalid UTF-8 surfaces as an InvalidData I/O error
        let content = fs::read_to_string(path).await.map_err(ScanError::Io)?;
        Ok(content)
    }
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await.map_err(ScanError::Io)?;

        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| ScanError::PdfExtraction(format!("PDF worker failed: {}", e)))?
        .map_err(|e| {
            ScanError::PdfExtraction(format!(
                "Failed to extract text from PDF '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages.join("\n"))
    }
}

pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await.map_err(ScanError::Io)?;
        let text = tokio::task::spawn_blocking(move || extract_docx_bytes(&bytes))
            .await
            .map_err(|e| ScanError::DocxExtraction(format!("DOCX worker failed: {}", e)))?;

        text.map_err(|e| match e {
            ScanError::DocxExtraction(msg) => {
                ScanError::DocxExtraction(format!("'{}': {}", path.display(), msg))
            }
            other => other,
        })
    }
}

/// Fallback for unrecognized extensions
pub struct RawBytesExtractor;

impl TextExtractor for RawBytesExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await.map_err(ScanError::Io)?;
        warn!(
            "Unrecognized file type for {}, decoding raw bytes as UTF-8",
            path.display()
        );
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Paragraph text of a DOCX container held in memory
pub fn extract_docx_bytes(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ScanError::DocxExtraction(format!("Not a DOCX container: {}", e)))?;

    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| ScanError::DocxExtraction(format!("Missing word/document.xml: {}", e)))?;

    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|e| ScanError::DocxExtraction(format!("Unreadable document.xml: {}", e)))?;

    docx_xml_to_text(&xml)
}

/// One line per body `w:p` element, in document order. Text boxes and
/// compatibility fallbacks belong to the drawing, not the paragraph.
pub fn docx_xml_to_text(xml: &str) -> Result<String> {
    let markup = DocxMarkup::new()?;
    let body = markup.strip_embedded(xml);

    let paragraphs: Vec<String> = markup
        .paragraph
        .captures_iter(&body)
        .map(|caps| match caps.get(1) {
            Some(body) => markup.paragraph_text(body.as_str()),
            None => String::new(),
        })
        .collect();

    debug!("DOCX body holds {} paragraphs", paragraphs.len());
    Ok(paragraphs.join("\n"))
}

struct DocxMarkup {
    embedded: Regex,
    paragraph: Regex,
    properties: Regex,
    content: Regex,
    entity: Regex,
}

impl DocxMarkup {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ScanError::DocxExtraction(format!("Invalid pattern: {}", e)))
        };

        Ok(Self {
            embedded: compile(r"<(/?)(w:txbxContent|mc:Fallback)(?:\s[^>]*?)?(/?)>")?,
            paragraph: compile(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>")?,
            // Tab stop definitions live in paragraph properties
            properties: compile(r"(?s)<w:pPr(?:\s[^>]*)?>.*?</w:pPr>")?,
            content: compile(
                r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:(tab|br|cr)(?:\s[^>]*)?/>",
            )?,
            entity: compile(r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|amp|quot|apos);")?,
        })
    }

    /// Drop `w:txbxContent` and `mc:Fallback` subtrees, nesting included
    fn strip_embedded(&self, xml: &str) -> String {
        let mut out = String::with_capacity(xml.len());
        let mut depth = 0usize;
        let mut last = 0;

        for caps in self.embedded.captures_iter(xml) {
            let Some(tag) = caps.get(0) else { continue };
            if depth == 0 {
                out.push_str(&xml[last..tag.start()]);
            }
            if !caps[1].is_empty() {
                depth = depth.saturating_sub(1);
            } else if caps[3].is_empty() {
                depth += 1;
            }
            last = tag.end();
        }

        if depth == 0 {
            out.push_str(&xml[last..]);
        }
        out
    }

    fn paragraph_text(&self, body: &str) -> String {
        let body = self.properties.replace_all(body, "");
        let mut text = String::new();

        for caps in self.content.captures_iter(&body) {
            if let Some(run) = caps.get(1) {
                text.push_str(&self.unescape(run.as_str()));
                continue;
            }
            match caps.get(2).map(|m| m.as_str()) {
                Some("tab") => text.push('\t'),
                Some(_) => text.push('\n'),
                None => {}
            }
        }

        text
    }

    fn unescape(&self, raw: &str) -> String {
        self.entity
            .replace_all(raw, |caps: &Captures| {
                let entity = &caps[1];
                let decoded = match entity {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => {
                        let code = match entity.strip_prefix("#x") {
                            Some(hex) => u32::from_str_radix(hex, 16).ok(),
                            None => entity[1..].parse().ok(),
                        };
                        code.and_then(char::from_u32)
                    }
                };
                decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p w14:paraId="1"><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Buy now</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> &amp; save</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>Click&#160;here</w:t><w:br/><w:t>&lt;today&gt;</w:t></w:r></w:p>
</w:body></w:document>"#;

    fn docx_bytes(xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs_in_order() {
        let text = docx_xml_to_text(DOCUMENT_XML).unwrap();
        assert_eq!(text, "Buy now\t & save\n\nClick\u{a0}here\n<today>");
    }

    #[test]
    fn test_docx_text_box_keeps_paragraph_tail() {
        let xml = r#"<w:body><w:p><w:r><w:t>Buy now</w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>inside box</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t xml:space="preserve"> and subscribe today</w:t></w:r></w:p><w:p><w:r><w:t>Click here</w:t></w:r></w:p></w:body>"#;

        let text = docx_xml_to_text(xml).unwrap();
        assert_eq!(text, "Buy now and subscribe today\nClick here");
    }

    #[test]
    fn test_docx_alternate_content_drawing() {
        let xml = r#"<w:body><w:p><w:r><w:t>Enroll</w:t></w:r><w:r><mc:AlternateContent><mc:Choice Requires="wps"><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>box</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></mc:Choice><mc:Fallback><w:pict><v:textbox><w:txbxContent><w:p><w:r><w:t>box</w:t></w:r></w:p></w:txbxContent></v:textbox></w:pict></mc:Fallback></mc:AlternateContent></w:r><w:r><w:t xml:space="preserve"> today</w:t></w:r></w:p><mc:Fallback /></w:body>"#;

        assert_eq!(docx_xml_to_text(xml).unwrap(), "Enroll today");
    }

    #[test]
    fn test_docx_container_roundtrip() {
        let text = extract_docx_bytes(&docx_bytes(DOCUMENT_XML)).unwrap();
        assert!(text.starts_with("Buy now"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_docx_without_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::FileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            extract_docx_bytes(&bytes),
            Err(ScanError::DocxExtraction(_))
        ));
    }

    #[test]
    fn test_unescape_leaves_unknown_entities() {
        let markup = DocxMarkup::new().unwrap();
        assert_eq!(markup.unescape("&amp;lt; &nbsp; &#x41;"), "&lt; &nbsp; A");
    }

    #[tokio::test]
    async fn test_plain_text_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.txt");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0x6f]).unwrap();

        let result = PlainTextExtractor.extract(&path).await;
        assert!(matches!(result, Err(ScanError::Io(_))));
    }

    #[tokio::test]
    async fn test_raw_bytes_decode_lossy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("captions.srt");
        std::fs::write(&path, [b'b', b'u', b'y', 0xff]).unwrap();

        let text = RawBytesExtractor.extract(&path).await.unwrap();
        assert_eq!(text, "buy\u{fffd}");
    }

    #[tokio::test]
    async fn test_pdf_pages_in_order() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("two_pages.pdf");

        let text = PdfExtractor.extract(&path).await.unwrap();
        let first = text.find("Purchase").unwrap();
        let second = text.find("Enroll").unwrap();
        assert!(first < second);
        assert!(text[first..second].contains('\n'));
    }

    #[tokio::test]
    async fn test_malformed_pdf_is_extraction_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("flyer.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let result = PdfExtractor.extract(&path).await;
        assert!(matches!(result, Err(ScanError::PdfExtraction(_))));
    }
}
