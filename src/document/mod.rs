// Document extractors
//
// Each supported format provides one extractor:
// - PlainText: .txt / .md, written back verbatim
// - Pdf: text per page, written back as plain text
// - Docx: paragraphs of word/document.xml, written back as a new .docx
// - Odt: text of content.xml, written back as plain text
//
// The registry picks the first extractor that accepts an extension.

pub mod docx;
pub mod odt;
pub mod pdf;
pub mod plain;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Format specific reading of source text and writing of translated text
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Whether this extractor reads files with `extension` (no leading dot)
    fn can_handle(&self, extension: &str) -> bool;

    /// Text content of the document; a document without text yields `""`
    async fn extract_text(&self, path: &Path) -> Result<String>;

    /// Write `translated_text` for the document at `path`.
    ///
    /// Returns the path actually written, which gains an extension when
    /// `output_path` has none.
    async fn build_output(
        &self,
        path: &Path,
        translated_text: &str,
        output_path: &Path,
    ) -> Result<PathBuf>;
}

/// Ordered set of extractors looked up by file extension
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Box<dyn DocumentExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn find(&self, extension: &str) -> Option<&dyn DocumentExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.can_handle(extension))
            .map(|extractor| extractor.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(plain::PlainTextExtractor),
            Box::new(pdf::PdfExtractor),
            Box::new(docx::DocxExtractor),
            Box::new(odt::OdtExtractor),
        ])
    }
}

/// `output_path` unchanged if it has an extension, otherwise with `.extension` appended.
pub fn with_default_extension(output_path: &Path, extension: &str) -> PathBuf {
    if output_path.extension().is_some_and(|ext| !ext.is_empty()) {
        return output_path.to_path_buf();
    }

    let mut raw = output_path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}
