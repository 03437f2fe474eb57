use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::{DocumentExtractor, with_default_extension};
use crate::error::Result;

/// PDF input; translations are written as plain text
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("pdf")
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_pdf_text(&path)).await?
    }

    async fn build_output(
        &self,
        _path: &Path,
        translated_text: &str,
        output_path: &Path,
    ) -> Result<PathBuf> {
        let output_path = with_default_extension(output_path, "txt");
        fs::write(&output_path, translated_text).await?;
        Ok(output_path)
    }
}

fn extract_pdf_text(path: &Path) -> Result<String> {
    let document = Document::load(path)?;
    let pages = document.get_pages();
    debug!("PDF {} has {} pages", path.display(), pages.len());

    let mut text = String::new();
    for page_number in pages.keys() {
        let page_text = document.extract_text(&[*page_number]).unwrap_or_else(|e| {
            warn!("No text extracted from page {}: {}", page_number, e);
            String::new()
        });

        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&page_text);
        text.push('\n');
    }

    if text.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_output_is_plain_text() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan.pdf");

        let written = PdfExtractor
            .build_output(&source, "bonjour", &dir.path().join("scan-fr"))
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("scan-fr.txt"));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "bonjour");
    }

    #[tokio::test]
    async fn test_explicit_output_extension_kept() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("scan-fr.pdf");

        let written = PdfExtractor
            .build_output(Path::new("/in.pdf"), "bonjour", &output)
            .await
            .unwrap();

        assert_eq!(written, output);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        assert!(PdfExtractor.extract_text(&path).await.is_err());
    }
}
