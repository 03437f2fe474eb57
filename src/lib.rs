//! Honyaku - local document and image translation
//!
//! Translates text, documents (txt, md, pdf, docx, odt) and images through
//! models served by a local ollama instance.

pub mod app;
pub mod archive;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod file_translate;
pub mod image_translate;
pub mod language;
pub mod logging;
pub mod ollama;
pub mod prompt;
pub mod translate;
