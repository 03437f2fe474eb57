use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, OpenOptions};
use tracing::{debug, error, info, warn};

use crate::archive::{is_archive_extension, is_archive_safe};
use crate::config::SettingsProvider;
use crate::document::{DocumentExtractor, ExtractorRegistry};
use crate::error::{ErrorKind, Result};
use crate::translate::{TranslationRequest, TranslationService};

/// Largest input file accepted for translation
pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Path of the written translation, or the reason there is none
pub type FileTranslationResult = std::result::Result<PathBuf, ErrorKind>;

/// Translates whole documents: checks paths and sizes, extracts text,
/// translates it and writes the result next to the requested output path.
pub struct FileTranslationService {
    extractors: ExtractorRegistry,
    translation: Arc<TranslationService>,
    settings: Arc<dyn SettingsProvider>,
}

impl FileTranslationService {
    pub fn new(
        extractors: ExtractorRegistry,
        translation: Arc<TranslationService>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            extractors,
            translation,
            settings,
        }
    }

    /// Translate the document at `input_path` into `output_path`.
    ///
    /// Missing language codes fall back to the defaults in the settings.
    pub async fn translate_file(
        &self,
        input_path: &str,
        output_path: &str,
        source_language_code: Option<&str>,
        target_language_code: Option<&str>,
    ) -> FileTranslationResult {
        let (input, output) = self.validate_paths(input_path, output_path).await?;
        let created_output = claim_output(&output).await?;

        let outcome = match self.select_extractor(&input).await {
            Ok(extractor) => {
                match self
                    .run(&input, &output, extractor, source_language_code, target_language_code)
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!("File translation failed for {}: {}", input.display(), e);
                        Err(ErrorKind::FileTranslationFailed)
                    }
                }
            }
            Err(kind) => Err(kind),
        };

        // the access check left an empty file behind unless it was written to
        if created_output && outcome.as_ref().map_or(true, |written| written != &output) {
            if let Err(e) = fs::remove_file(&output).await {
                debug!("Could not remove placeholder {}: {}", output.display(), e);
            }
        }

        outcome
    }

    async fn validate_paths(
        &self,
        input_path: &str,
        output_path: &str,
    ) -> std::result::Result<(PathBuf, PathBuf), ErrorKind> {
        if input_path.trim().is_empty() {
            return Err(ErrorKind::FileNotSelected);
        }
        let input = absolute_path(input_path)?;

        let metadata = match fs::metadata(&input).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(ErrorKind::FileNotFound),
        };
        if metadata.len() > MAX_FILE_SIZE_BYTES {
            warn!("{} is {} bytes, over the limit", input.display(), metadata.len());
            return Err(ErrorKind::FileTooLarge);
        }

        if output_path.trim().is_empty() {
            return Err(ErrorKind::OutputNotSelected);
        }
        let output = absolute_path(output_path)?;
        let output_dir = output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or(ErrorKind::InvalidPath)?;

        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| access_error("create output directory", output_dir, e))?;

        fs::File::open(&input)
            .await
            .map_err(|e| access_error("open input", &input, e))?;

        Ok((input, output))
    }

    async fn select_extractor(
        &self,
        input: &Path,
    ) -> std::result::Result<&dyn DocumentExtractor, ErrorKind> {
        let extension = input
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if is_archive_extension(extension) {
            let archive = input.to_path_buf();
            let safe = tokio::task::spawn_blocking(move || is_archive_safe(&archive))
                .await
                .unwrap_or(false);
            if !safe {
                return Err(ErrorKind::FileUnsafe);
            }
        }

        self.extractors
            .find(extension)
            .ok_or(ErrorKind::FileUnsupported)
    }

    async fn run(
        &self,
        input: &Path,
        output: &Path,
        extractor: &dyn DocumentExtractor,
        source_language_code: Option<&str>,
        target_language_code: Option<&str>,
    ) -> Result<FileTranslationResult> {
        let source_text = extractor.extract_text(input).await?;
        let settings = self.settings.current();
        let request = TranslationRequest::new(
            source_text,
            source_language_code.unwrap_or(&settings.default_source_lang),
            target_language_code.unwrap_or(&settings.default_target_lang),
            settings.default_model.clone(),
        );

        let translated = match self.translation.translate(&request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Model returned an empty translation for {}", input.display());
                return Ok(Err(ErrorKind::FileTranslationFailed));
            }
            Err(kind) => return Ok(Err(kind)),
        };

        let written = extractor.build_output(input, &translated, output).await?;
        info!("Translated {} into {}", input.display(), written.display());
        Ok(Ok(written))
    }
}

/// Check the output can be written. Returns whether the check created the file.
async fn claim_output(output: &Path) -> std::result::Result<bool, ErrorKind> {
    let existed = fs::try_exists(output).await.unwrap_or(true);

    OpenOptions::new()
        .write(true)
        .create(true)
        .open(output)
        .await
        .map_err(|e| access_error("open output", output, e))?;

    Ok(!existed)
}

/// Absolute form of a user supplied path; relative paths are rejected.
fn absolute_path(raw: &str) -> std::result::Result<PathBuf, ErrorKind> {
    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(ErrorKind::InvalidPath);
    }
    std::path::absolute(path).map_err(|_| ErrorKind::InvalidPath)
}

/// Map a filesystem failure during the access checks to a caller token.
fn access_error(action: &str, path: &Path, e: io::Error) -> ErrorKind {
    if e.kind() == io::ErrorKind::PermissionDenied {
        warn!("Access denied: cannot {} {}: {}", action, path.display(), e);
        ErrorKind::FileAccessDenied
    } else {
        error!("Cannot {} {}: {}", action, path.display(), e);
        ErrorKind::FileTranslationFailed
    }
}
