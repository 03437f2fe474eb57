use crate::language::LanguageInfo;

/// Builds the instructions sent to the translation model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Text translation prompt.
    ///
    /// The payload follows the instructions after exactly two blank lines;
    /// translategemma models are tuned on that layout.
    pub fn build(&self, source: &LanguageInfo, target: &LanguageInfo, text: &str) -> String {
        format!(
            "You are a professional {src} ({src_code}) to {tgt} ({tgt_code}) translator. \
             Your goal is to accurately convey the meaning and nuances of the original {src} text while \
             adhering to {tgt} grammar, vocabulary, and cultural sensitivities.\n\
             Produce only the {tgt} translation, without any additional explanations or commentary. \
             Please translate the following {src} text into {tgt}:\n\n\n{text}",
            src = source.name,
            src_code = source.code,
            tgt = target.name,
            tgt_code = target.code,
            text = text,
        )
    }

    /// Prompt for translating the text visible in an attached image.
    pub fn build_image(&self, source: &LanguageInfo, target: &LanguageInfo) -> String {
        format!(
            "You are a professional {src} ({src_code}) to {tgt} ({tgt_code}) translator. \
             Translate the text in the provided image into {tgt}. \
             Produce only the {tgt} translation, without any additional explanations or commentary.",
            src = source.name,
            src_code = source.code,
            tgt = target.name,
            tgt_code = target.code,
        )
    }
}
