use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::{DocumentExtractor, with_default_extension};
use crate::error::Result;

const UTF8_BOM: &str = "\u{feff}";

/// Plain text and markdown, written back as-is
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("txt") || extension.eq_ignore_ascii_case("md")
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        let decoded = String::from_utf8_lossy(&bytes);
        let text: &str = &decoded;
        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string())
    }

    async fn build_output(
        &self,
        path: &Path,
        translated_text: &str,
        output_path: &Path,
    ) -> Result<PathBuf> {
        let output_path = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => with_default_extension(output_path, ext),
            None => output_path.to_path_buf(),
        };

        fs::write(&output_path, translated_text).await?;
        info!("Wrote translated text to {}", output_path.display());
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_and_build_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        std::fs::write(&input, "hello").unwrap();

        let extracted = PlainTextExtractor.extract_text(&input).await.unwrap();
        let written = PlainTextExtractor.build_output(&input, "hola", &output).await.unwrap();

        assert_eq!(extracted, "hello");
        assert_eq!(written, output);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "hola");
    }

    #[tokio::test]
    async fn test_output_keeps_source_extension() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.md");
        std::fs::write(&input, "# Title").unwrap();

        let written = PlainTextExtractor
            .build_output(&input, "# Titre", &dir.path().join("translated"))
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("translated.md"));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "# Titre");
    }

    #[tokio::test]
    async fn test_bom_and_empty_file() {
        let dir = TempDir::new().unwrap();
        let bom = dir.path().join("bom.txt");
        let empty = dir.path().join("empty.txt");
        std::fs::write(&bom, "\u{feff}hello").unwrap();
        std::fs::write(&empty, "").unwrap();

        assert_eq!(PlainTextExtractor.extract_text(&bom).await.unwrap(), "hello");
        assert_eq!(PlainTextExtractor.extract_text(&empty).await.unwrap(), "");
    }
}
