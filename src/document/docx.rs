use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{DocumentExtractor, with_default_extension};
use crate::archive::read_entry_bounded;
use crate::error::Result;

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Word documents; translations are written as a new minimal .docx
pub struct DocxExtractor;

#[async_trait]
impl DocumentExtractor for DocxExtractor {
    fn can_handle(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("docx")
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_docx_text(&path)).await?
    }

    async fn build_output(
        &self,
        _path: &Path,
        translated_text: &str,
        output_path: &Path,
    ) -> Result<PathBuf> {
        let output_path = with_default_extension(output_path, "docx");
        let text = translated_text.to_string();
        let target = output_path.clone();
        tokio::task::spawn_blocking(move || write_docx(&target, &text)).await??;

        info!("Wrote translated document to {}", output_path.display());
        Ok(output_path)
    }
}

fn read_docx_text(path: &Path) -> Result<String> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let xml = match archive.by_name(DOCUMENT_PART) {
        Ok(mut entry) => {
            let declared = entry.size();
            read_entry_bounded(&mut entry, declared)?
        }
        Err(ZipError::FileNotFound) => {
            debug!("{} has no {}", path.display(), DOCUMENT_PART);
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    Ok(body_paragraphs(&xml)?.join("\n"))
}

/// Text of each paragraph directly under the document body.
///
/// Paragraphs nested deeper (tables, text boxes) are not collected.
fn body_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    // open paragraph: element depth and collected text
    let mut current: Option<(usize, String)> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"p" && current.is_none() && parent_is_body(&stack) {
                    current = Some((stack.len(), String::new()));
                } else if name == b"t" && current.is_some() {
                    in_text = true;
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"p" && current.is_none() && parent_is_body(&stack) {
                    paragraphs.push(String::new());
                }
            }
            Event::Text(t) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if in_text => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" if matches!(current, Some((depth, _)) if depth == stack.len()) => {
                        if let Some((_, text)) = current.take() {
                            paragraphs.push(text);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn parent_is_body(stack: &[Vec<u8>]) -> bool {
    stack.last().is_some_and(|name| name.as_slice() == b"body")
}

fn write_docx(path: &Path, text: &str) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(PACKAGE_RELS.as_bytes())?;
    zip.start_file(DOCUMENT_PART, options)?;
    zip.write_all(document_xml(text).as_bytes())?;
    zip.finish()?;

    Ok(())
}

fn document_xml(text: &str) -> String {
    let mut body = String::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        body.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
        body.push_str(&escape(line));
        body.push_str("</w:t></w:r></w:p>");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    )
}
