use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HonyakuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid Ollama URL: {0}")]
    InvalidUrl(String),

    #[error("Ollama request failed with status {status}")]
    InferenceRequestFailed { status: u16 },

    #[error("Unexpected Ollama response")]
    UnexpectedResponseShape,

    #[error("Model pull failed: {0}")]
    PullFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, HonyakuError>;

/// Stable failure tokens handed back to callers of the orchestrators.
///
/// The token (see [`ErrorKind::as_str`]) is the contract; the `Display`
/// message is only for humans reading a terminal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[error("source text is empty")]
    EmptySource,

    #[error("unknown source language")]
    UnknownSourceLanguage,

    #[error("unknown target language")]
    UnknownTargetLanguage,

    #[error("source and target language are the same")]
    SameLanguage,

    #[error("translation failed")]
    TranslationFailed,

    #[error("no input file selected")]
    FileNotSelected,

    #[error("path must be absolute")]
    InvalidPath,

    #[error("input file not found")]
    FileNotFound,

    #[error("file is larger than 50 MiB")]
    FileTooLarge,

    #[error("no output file selected")]
    OutputNotSelected,

    #[error("file access denied")]
    FileAccessDenied,

    #[error("archive looks unsafe to extract")]
    FileUnsafe,

    #[error("file type is not supported")]
    FileUnsupported,

    #[error("file translation failed")]
    FileTranslationFailed,

    #[error("no image selected")]
    ImageNotSelected,

    #[error("image not found")]
    ImageNotFound,

    #[error("image translation failed")]
    ImageTranslationFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptySource => "EmptySource",
            Self::UnknownSourceLanguage => "UnknownSourceLanguage",
            Self::UnknownTargetLanguage => "UnknownTargetLanguage",
            Self::SameLanguage => "SameLanguage",
            Self::TranslationFailed => "TranslationFailed",
            Self::FileNotSelected => "FileNotSelected",
            Self::InvalidPath => "InvalidPath",
            Self::FileNotFound => "FileNotFound",
            Self::FileTooLarge => "FileTooLarge",
            Self::OutputNotSelected => "OutputNotSelected",
            Self::FileAccessDenied => "FileAccessDenied",
            Self::FileUnsafe => "FileUnsafe",
            Self::FileUnsupported => "FileUnsupported",
            Self::FileTranslationFailed => "FileTranslationFailed",
            Self::ImageNotSelected => "ImageNotSelected",
            Self::ImageNotFound => "ImageNotFound",
            Self::ImageTranslationFailed => "ImageTranslationFailed",
        }
    }
}
