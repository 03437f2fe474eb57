use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file path
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate text (read from stdin when --text is omitted)
    Translate {
        /// Text to translate
        #[arg(short, long)]
        text: Option<String>,

        /// Source language code
        #[arg(short, long)]
        from: Option<String>,

        /// Target language code
        #[arg(long)]
        to: Option<String>,

        /// Model tag
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Translate a document (txt, md, pdf, docx, odt)
    File {
        /// Input document
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: <stem>.translated.<ext> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source language code
        #[arg(short, long)]
        from: Option<String>,

        /// Target language code
        #[arg(long)]
        to: Option<String>,
    },

    /// Translate the text shown in an image (png, jpg, jpeg, tiff, tif)
    Image {
        /// Input image
        #[arg(short, long)]
        input: PathBuf,

        /// Source language code
        #[arg(short, long)]
        from: Option<String>,

        /// Target language code
        #[arg(long)]
        to: Option<String>,

        /// Multimodal model tag
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List models installed on the ollama server
    Models,

    /// Download a model onto the ollama server
    Pull {
        /// Model tag (default: the configured model)
        model: Option<String>,
    },

    /// List supported languages
    Languages,

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Show,

    /// Change one or more settings
    Set {
        /// Ollama endpoint URL
        #[arg(long)]
        ollama_url: Option<String>,

        /// Default model tag
        #[arg(long)]
        model: Option<String>,

        /// Default source language code
        #[arg(long)]
        source: Option<String>,

        /// Default target language code
        #[arg(long)]
        target: Option<String>,

        /// Log level (trace, debug, info, warn, error, critical, none)
        #[arg(long)]
        log_level: Option<String>,

        /// Close behavior (exit, minimize-to-tray)
        #[arg(long)]
        close_behavior: Option<String>,

        /// Ask before closing
        #[arg(long)]
        show_close_confirmation: Option<bool>,
    },
}
