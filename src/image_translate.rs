use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, Result};
use crate::language::LanguageCatalog;
use crate::ollama::InferenceClient;
use crate::prompt::PromptBuilder;
use crate::translate::TranslationResult;

/// Largest image accepted for translation
pub const MAX_IMAGE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tiff", "tif"];

/// Translates the text shown in an image through a multimodal model.
pub struct ImageTranslationService {
    client: Arc<dyn InferenceClient>,
    languages: Arc<LanguageCatalog>,
    prompts: PromptBuilder,
}

impl ImageTranslationService {
    pub fn new(client: Arc<dyn InferenceClient>, languages: Arc<LanguageCatalog>) -> Self {
        Self {
            client,
            languages,
            prompts: PromptBuilder::new(),
        }
    }

    pub async fn translate_image(
        &self,
        image_path: &str,
        source_language_code: &str,
        target_language_code: &str,
        model: &str,
    ) -> TranslationResult {
        if image_path.trim().is_empty() {
            return Err(ErrorKind::ImageNotSelected);
        }

        let path = Path::new(image_path);
        if !path.is_absolute() {
            return Err(ErrorKind::InvalidPath);
        }

        let metadata = match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(ErrorKind::ImageNotFound),
        };

        if !is_supported_image(path) {
            return Err(ErrorKind::FileUnsupported);
        }

        if metadata.len() > MAX_IMAGE_SIZE_BYTES {
            warn!("{} is {} bytes, over the limit", path.display(), metadata.len());
            return Err(ErrorKind::FileTooLarge);
        }

        if let Err(e) = fs::File::open(path).await {
            warn!("Cannot open image {}: {}", path.display(), e);
            return Err(ErrorKind::FileAccessDenied);
        }

        let (source, target) = self
            .languages
            .resolve_pair(source_language_code, target_language_code)?;
        let prompt = self.prompts.build_image(source, target);

        match self.send(path, model, &prompt).await {
            Ok(translated) => Ok(translated),
            Err(e) => {
                error!("Image translation failed for {}: {}", path.display(), e);
                Err(ErrorKind::ImageTranslationFailed)
            }
        }
    }

    async fn send(&self, path: &Path, model: &str, prompt: &str) -> Result<String> {
        let bytes = fs::read(path).await?;
        info!("Translating image {} ({} bytes) with {}", path.display(), bytes.len(), model);

        let encoded = STANDARD.encode(&bytes);
        self.client
            .generate_with_images(model, prompt, vec![encoded])
            .await
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}
