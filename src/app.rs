use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{SettingsProvider, SettingsStore};
use crate::document::ExtractorRegistry;
use crate::error::Result;
use crate::file_translate::FileTranslationService;
use crate::image_translate::ImageTranslationService;
use crate::language::LanguageCatalog;
use crate::ollama::{InferenceClient, OllamaClient};
use crate::translate::TranslationService;

/// All services of the application, wired to one settings store.
pub struct App {
    pub settings: Arc<SettingsStore>,
    pub languages: Arc<LanguageCatalog>,
    pub client: Arc<dyn InferenceClient>,
    pub translation: Arc<TranslationService>,
    pub files: FileTranslationService,
    pub images: ImageTranslationService,
}

impl App {
    /// Wire the services against the ollama server named in `settings`.
    pub fn new(settings: Arc<SettingsStore>) -> Result<Self> {
        let provider: Arc<dyn SettingsProvider> = settings.clone();
        let client: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(provider)?);
        Ok(Self::with_client(settings, client))
    }

    /// Wire the services around an existing inference client.
    pub fn with_client(settings: Arc<SettingsStore>, client: Arc<dyn InferenceClient>) -> Self {
        let languages = Arc::new(LanguageCatalog::builtin());
        let translation = Arc::new(TranslationService::new(client.clone(), languages.clone()));
        let files = FileTranslationService::new(
            ExtractorRegistry::default(),
            translation.clone(),
            settings.clone(),
        );
        let images = ImageTranslationService::new(client.clone(), languages.clone());

        Self {
            settings,
            languages,
            client,
            translation,
            files,
            images,
        }
    }
}

/// Run `operation` until it finishes or `cancel` fires.
///
/// A cancelled operation is dropped where it stands and yields `None`.
pub async fn cancellable<F>(cancel: &CancellationToken, operation: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Operation cancelled");
            None
        }
        output = operation => Some(output),
    }
}

/// `<dir>/<stem>.translated.<ext>` next to `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    let name = match input.extension() {
        Some(ext) => format!("{}.translated.{}", stem, ext.to_string_lossy()),
        None => format!("{}.translated", stem),
    };
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use crate::error::ErrorKind;
    use crate::ollama::MockInferenceClient;
    use crate::translate::TranslationRequest;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/docs/report.docx")),
            PathBuf::from("/docs/report.translated.docx")
        );
        assert_eq!(
            default_output_path(Path::new("/docs/README")),
            PathBuf::from("/docs/README.translated")
        );
        assert_eq!(
            default_output_path(Path::new("/docs/archive.tar.gz")),
            PathBuf::from("/docs/archive.tar.translated.gz")
        );
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_cancellable_drops_pending_work() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = cancellable(&cancel, std::future::pending::<u32>()).await;

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_app_reads_defaults_from_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SettingsStore::new(dir.path().join("settings.toml")));
        store.update(|s| {
            *s = AppSettings {
                default_source_lang: "en".to_string(),
                default_target_lang: "de".to_string(),
                ..AppSettings::default()
            }
        });

        let mut client = MockInferenceClient::new();
        client
            .expect_generate()
            .withf(|_: &str, prompt: &str| prompt.contains("into German:"))
            .times(1)
            .returning(|_, _| Ok("Hallo".to_string()));
        let app = App::with_client(store, Arc::new(client));

        let input = dir.path().join("note.txt");
        std::fs::write(&input, "Hello").unwrap();
        let output = default_output_path(&input);

        let written = app
            .files
            .translate_file(&input.to_string_lossy(), &output.to_string_lossy(), None, None)
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("note.translated.txt"));
        assert_eq!(std::fs::read_to_string(written).unwrap(), "Hallo");
    }

    #[tokio::test]
    async fn test_app_translation_shares_catalog() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SettingsStore::new(dir.path().join("settings.toml")));

        let mut client = MockInferenceClient::new();
        client.expect_generate().times(0);
        let app = App::with_client(store, Arc::new(client));

        let request = TranslationRequest::new("Hello", "en", "EN", "m");
        assert_eq!(app.translation.translate(&request).await, Err(ErrorKind::SameLanguage));
        assert!(app.languages.get("ru").is_some());
    }
}
