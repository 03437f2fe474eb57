use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::ErrorKind;
use crate::language::LanguageCatalog;
use crate::ollama::InferenceClient;
use crate::prompt::PromptBuilder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_text: String,
    pub source_language_code: String,
    pub target_language_code: String,
    pub model: String,
}

impl TranslationRequest {
    pub fn new(
        source_text: impl Into<String>,
        source_language_code: impl Into<String>,
        target_language_code: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            source_language_code: source_language_code.into(),
            target_language_code: target_language_code.into(),
            model: model.into(),
        }
    }
}

/// Translated text, or the reason there is none
pub type TranslationResult = std::result::Result<String, ErrorKind>;

/// Validates text translation requests and runs them against the model.
pub struct TranslationService {
    client: Arc<dyn InferenceClient>,
    languages: Arc<LanguageCatalog>,
    prompts: PromptBuilder,
}

impl TranslationService {
    pub fn new(client: Arc<dyn InferenceClient>, languages: Arc<LanguageCatalog>) -> Self {
        Self {
            client,
            languages,
            prompts: PromptBuilder::new(),
        }
    }

    /// Translate `request.source_text`.
    ///
    /// Input problems are reported before the inference server is contacted;
    /// server failures are logged and reported as `TranslationFailed`.
    pub async fn translate(&self, request: &TranslationRequest) -> TranslationResult {
        if request.source_text.trim().is_empty() {
            return Err(ErrorKind::EmptySource);
        }

        let (source, target) = self
            .languages
            .resolve_pair(&request.source_language_code, &request.target_language_code)?;

        let prompt = self.prompts.build(source, target, &request.source_text);
        info!(
            "Translating {} chars {} -> {} with {}",
            request.source_text.chars().count(),
            source.code,
            target.code,
            request.model
        );
        debug!("Prompt: {}", prompt);

        match self.client.generate(&request.model, &prompt).await {
            Ok(translated) => Ok(translated),
            Err(e) => {
                error!("Translation request failed: {}", e);
                Err(ErrorKind::TranslationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HonyakuError;
    use crate::ollama::MockInferenceClient;
    use tokio_test::{assert_err, assert_ok};

    fn service(client: MockInferenceClient) -> TranslationService {
        TranslationService::new(Arc::new(client), Arc::new(LanguageCatalog::builtin()))
    }

    #[tokio::test]
    async fn test_translates_with_built_prompt() {
        let mut client = MockInferenceClient::new();
        client
            .expect_generate()
            .withf(|model: &str, prompt: &str| {
                model == "translategemma:4b"
                    && prompt.starts_with("You are a professional English (en) to Russian (ru) translator.")
                    && prompt.ends_with("\n\n\nHello")
            })
            .times(1)
            .returning(|_, _| Ok("Привет".to_string()));

        let request = TranslationRequest::new("Hello", "en", "ru", "translategemma:4b");
        let translated = assert_ok!(service(client).translate(&request).await);

        assert_eq!(translated, "Привет");
    }

    #[tokio::test]
    async fn test_same_language_in_any_case_is_rejected() {
        let mut client = MockInferenceClient::new();
        client.expect_generate().times(0);
        let service = service(client);

        for (source, target) in [("en", "en"), ("EN", "en"), ("en", "En"), ("Ja", "jA")] {
            for text in ["Hello", "", "  "] {
                let request = TranslationRequest::new(text, source, target, "m");
                let result = service.translate(&request).await;
                let expected = if text.trim().is_empty() {
                    ErrorKind::EmptySource
                } else {
                    ErrorKind::SameLanguage
                };
                assert_eq!(result, Err(expected));
            }
        }
    }

    #[tokio::test]
    async fn test_blank_text_never_reaches_server() {
        let mut client = MockInferenceClient::new();
        client.expect_generate().times(0);
        let service = service(client);

        for text in ["", " ", "\n\t "] {
            let request = TranslationRequest::new(text, "en", "ru", "m");
            assert_eq!(service.translate(&request).await, Err(ErrorKind::EmptySource));
        }
    }

    #[tokio::test]
    async fn test_unknown_languages() {
        let mut client = MockInferenceClient::new();
        client.expect_generate().times(0);
        let service = service(client);

        let request = TranslationRequest::new("Hello", "xx", "ru", "m");
        assert_eq!(service.translate(&request).await, Err(ErrorKind::UnknownSourceLanguage));

        let request = TranslationRequest::new("Hello", "en", "xx", "m");
        assert_eq!(service.translate(&request).await, Err(ErrorKind::UnknownTargetLanguage));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_token() {
        let mut client = MockInferenceClient::new();
        client
            .expect_generate()
            .times(1)
            .returning(|_, _| Err(HonyakuError::InferenceRequestFailed { status: 500 }));

        let request = TranslationRequest::new("Hello", "en", "ru", "m");
        let kind = assert_err!(service(client).translate(&request).await);

        assert_eq!(kind, ErrorKind::TranslationFailed);
    }
}
