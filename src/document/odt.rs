use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use super::{DocumentExtractor, with_default_extension};
use crate::archive::read_entry_bounded;
use crate::error::Result;

const CONTENT_PART: &str = "content.xml";

static PARAGRAPH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?text:p[^>]*>").expect("valid paragraph pattern"));
static HEADING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?text:h[^>]*>").expect("valid heading pattern"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// OpenDocument text; translations are written as plain text
pub struct OdtExtractor;

#[async_trait]
impl DocumentExtractor for OdtExtractor {
    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("odt")
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_odt_text(&path)).await?
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

fn read_odt_text(path: &Path) -> Result<String> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let xml = match archive.by_name(CONTENT_PART) {
        Ok(mut entry) => {
            let declared = entry.size();
            read_entry_bounded(&mut entry, declared)?
        }
        Err(ZipError::FileNotFound) => {
            debug!("{} has no {}", path.display(), CONTENT_PART);
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(strip_markup(&xml))
}

/// Paragraph and heading boundaries become line breaks, all other markup is dropped.
fn strip_markup(xml: &str) -> String {
    let with_breaks = PARAGRAPH_TAG.replace_all(xml, "\n");
    let with_breaks = HEADING_TAG.replace_all(&with_breaks, "\n");
    let text = ANY_TAG.replace_all(&with_breaks, "");

    match quick_xml::escape::unescape(&text) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!("Leaving entities undecoded: {}", e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    #[test]
    fn test_strip_markup() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content><office:body><office:text><text:h text:outline-level="1">Title</text:h><text:p text:style-name="P1">Fish &amp; <text:span>chips</text:span></text:p></office:text></office:body></office:document-content>"#;

        assert_eq!(strip_markup(xml), "\nTitle\n\nFish & chips\n");
    }

    #[tokio::test]
    async fn test_extract_from_package() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memo.odt");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("mimetype", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"application/vnd.oasis.opendocument.text").unwrap();
        zip.start_file(CONTENT_PART, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<office:text><text:p>Hello</text:p><text:p>&lt;world&gt;</text:p></office:text>")
            .unwrap();
        zip.finish().unwrap();

        let text = OdtExtractor.extract_text(&path).await.unwrap();

        assert_eq!(text, "\nHello\n\n<world>\n");
    }

    #[tokio::test]
    async fn test_missing_content_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hollow.odt");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("mimetype", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"application/vnd.oasis.opendocument.text").unwrap();
        zip.finish().unwrap();

        assert_eq!(OdtExtractor.extract_text(&path).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_output_is_plain_text() {
        let dir = TempDir::new().unwrap();

        let written = OdtExtractor
            .build_output(Path::new("/in.odt"), "hola", &dir.path().join("out"))
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("out.txt"));
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "hola");
    }
}
