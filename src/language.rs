use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ErrorKind, HonyakuError, Result};

const BUILTIN_CATALOG: &str = include_str!("../resources/languages.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
}

impl LanguageInfo {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

impl std::fmt::Display for LanguageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Read-only set of languages offered for translation.
///
/// Lookups ignore ASCII case, so `"EN"`, `"en"` and `"En"` resolve to
/// the same entry.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: Vec<LanguageInfo>,
    by_code: HashMap<String, usize>,
}

impl LanguageCatalog {
    /// Catalog shipped with the binary, or English/Russian if it is unusable.
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_CATALOG) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Failed to load language list, using defaults: {}", e);
                Self::fallback()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<LanguageInfo> = serde_json::from_str(json)?;
        if entries.is_empty() {
            return Err(HonyakuError::Config("Language list is empty".to_string()));
        }
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<LanguageInfo>) -> Self {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (idx, language) in entries.iter().enumerate() {
            // first entry wins on duplicate codes
            by_code.entry(language.code.to_lowercase()).or_insert(idx);
        }
        Self {
            languages: entries,
            by_code,
        }
    }

    fn fallback() -> Self {
        Self::from_entries(vec![
            LanguageInfo::new("en", "English"),
            LanguageInfo::new("ru", "Russian"),
        ])
    }

    pub fn languages(&self) -> &[LanguageInfo] {
        &self.languages
    }

    pub fn get(&self, code: &str) -> Option<&LanguageInfo> {
        self.by_code
            .get(&code.trim().to_lowercase())
            .map(|&idx| &self.languages[idx])
    }

    /// Resolve a source/target pair, rejecting unknown codes and identical languages.
    pub fn resolve_pair(
        &self,
        source_code: &str,
        target_code: &str,
    ) -> std::result::Result<(&LanguageInfo, &LanguageInfo), ErrorKind> {
        let source = self.get(source_code).ok_or(ErrorKind::UnknownSourceLanguage)?;
        let target = self.get(target_code).ok_or(ErrorKind::UnknownTargetLanguage)?;

        if source.code.eq_ignore_ascii_case(&target.code) {
            return Err(ErrorKind::SameLanguage);
        }
        Ok((source, target))
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_known_language() {
        let catalog = LanguageCatalog::builtin();
        let language = catalog.get("en").unwrap();
        assert_eq!(language.code, "en");
        assert_eq!(language.name, "English");
    }

    #[test]
    fn test_lookup_ignores_case_for_every_entry() {
        let catalog = LanguageCatalog::builtin();
        assert!(catalog.languages().len() > 2);

        for language in catalog.languages() {
            let lower = catalog.get(&language.code.to_lowercase()).unwrap();
            let upper = catalog.get(&language.code.to_uppercase()).unwrap();
            assert_eq!(lower, language);
            assert_eq!(upper, language);
        }
    }

    #[test]
    fn test_unknown_code_is_none() {
        let catalog = LanguageCatalog::builtin();
        assert!(catalog.get("xx").is_none());
        assert!(catalog.get("").is_none());
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(LanguageCatalog::from_json("[]").is_err());
        assert!(LanguageCatalog::from_json("{").is_err());
    }

    #[test]
    fn test_resolve_pair() {
        let catalog = LanguageCatalog::builtin();

        let (source, target) = catalog.resolve_pair("EN", "ru").unwrap();
        assert_eq!((source.code.as_str(), target.code.as_str()), ("en", "ru"));

        assert_eq!(catalog.resolve_pair("xx", "ru"), Err(ErrorKind::UnknownSourceLanguage));
        assert_eq!(catalog.resolve_pair("en", "xx"), Err(ErrorKind::UnknownTargetLanguage));
        assert_eq!(catalog.resolve_pair("De", "dE"), Err(ErrorKind::SameLanguage));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(LanguageInfo::new("ja", "Japanese").display_name(), "Japanese (ja)");
    }
}
