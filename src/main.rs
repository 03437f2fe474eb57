//! Honyaku - local document and image translation
//!
//! Command-line entry point. Every command runs against the services wired
//! in `honyaku::app` and can be interrupted with Ctrl-C.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use honyaku::app::{App, cancellable, default_output_path};
use honyaku::cli::{Args, Commands, SettingsAction};
use honyaku::config::{
    AppSettings, CloseBehavior, LogLevel, SettingsProvider, SettingsStore, default_settings_path,
};
use honyaku::error::ErrorKind;
use honyaku::logging::setup_logging;
use honyaku::ollama::{ModelPullProgress, PullOutcome, contains_model};
use honyaku::file_translate::FileTranslationResult;
use honyaku::translate::{TranslationRequest, TranslationResult};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let settings_path = match &args.settings {
        Some(path) => path.clone(),
        None => default_settings_path()?,
    };
    let store = Arc::new(SettingsStore::new(settings_path));
    let settings = store.load();

    // Dropping the guard flushes the file log
    let _guard = setup_logging(args.verbose, &settings)?;
    info!("Settings loaded from {}", store.path().display());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let app = App::new(store.clone())?;

    match args.command {
        Commands::Translate { text, from, to, model } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    tokio::io::stdin().read_to_string(&mut buffer).await?;
                    buffer
                }
            };
            let request = TranslationRequest::new(
                text,
                from.unwrap_or(settings.default_source_lang),
                to.unwrap_or(settings.default_target_lang),
                model.unwrap_or(settings.default_model),
            );

            match cancellable(&cancel, app.translation.translate(&request)).await {
                None => return Ok(cancelled()),
                Some(Ok(translated)) => println!("{}", translated),
                Some(Err(kind)) => return Ok(failed(kind)),
            }
        }
        Commands::File { input, output, from, to } => {
            let outcome =
                translate_file_command(&app, &cancel, &input, output, from.as_deref(), to.as_deref())
                    .await;

            match outcome {
                None => return Ok(cancelled()),
                Some(Ok(written)) => println!("Translation written to {}", written.display()),
                Some(Err(kind)) => return Ok(failed(kind)),
            }
        }
        Commands::Image { input, from, to, model } => {
            let from = from.unwrap_or(settings.default_source_lang);
            let to = to.unwrap_or(settings.default_target_lang);
            let model = model.unwrap_or(settings.default_model);

            match translate_image_command(&app, &cancel, &input, &from, &to, &model).await {
                None => return Ok(cancelled()),
                Some(Ok(translated)) => println!("{}", translated),
                Some(Err(kind)) => return Ok(failed(kind)),
            }
        }
        Commands::Models => {
            let Some(tags) = cancellable(&cancel, app.client.list_tags()).await else {
                return Ok(cancelled());
            };
            let tags = tags?;
            let default_model = store.current().default_model;

            println!("\nInstalled models:");
            println!("{}", "-".repeat(40));
            for tag in &tags {
                let marker = if tag.eq_ignore_ascii_case(&default_model) { "*" } else { " " };
                println!("{} {}", marker, tag);
            }
            if !contains_model(&tags, &default_model) {
                println!("\nDefault model {} is not installed; run `honyaku pull`.", default_model);
            }
        }
        Commands::Pull { model } => {
            let model = model.unwrap_or(settings.default_model);
            let (tx, rx) = unbounded_channel();
            let bar = progress_bar(&model)?;
            let reporter = tokio::spawn(report_progress(rx, bar.clone()));

            let outcome = app.client.pull_model(&model, Some(tx), cancel.clone()).await;
            // the sender went away with the pull, so the reporter drains and ends
            let _ = reporter.await;

            match outcome {
                Ok(PullOutcome::Completed) => {
                    bar.finish_with_message("done");
                    println!("Model {} is ready", model);
                }
                Ok(PullOutcome::Cancelled) => {
                    bar.abandon_with_message("cancelled");
                    return Ok(cancelled());
                }
                Err(e) => {
                    bar.abandon_with_message("failed");
                    return Err(e.into());
                }
            }
        }
        Commands::Languages => {
            println!("{:<8} {}", "Code", "Name");
            println!("{}", "-".repeat(30));
            for language in app.languages.languages() {
                println!("{:<8} {}", language.code, language.name);
            }
        }
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                println!("# {}", store.path().display());
                print!("{}", toml::to_string_pretty(&store.current())?);
            }
            SettingsAction::Set {
                ollama_url,
                model,
                source,
                target,
                log_level,
                close_behavior,
                show_close_confirmation,
            } => {
                let log_level = log_level.map(|s| s.parse::<LogLevel>()).transpose()?;
                let close_behavior = close_behavior
                    .map(|s| s.parse::<CloseBehavior>())
                    .transpose()?;
                if let Some(url) = &ollama_url {
                    reqwest::Url::parse(url)
                        .map_err(|e| anyhow::anyhow!("Invalid ollama URL '{}': {}", url, e))?;
                }
                for code in source.iter().chain(target.iter()) {
                    if app.languages.get(code).is_none() {
                        anyhow::bail!("Unknown language code '{}'", code);
                    }
                }

                let updated = store.try_update(|s| {
                    apply_settings(
                        s,
                        ollama_url,
                        model,
                        source,
                        target,
                        log_level,
                        close_behavior,
                        show_close_confirmation,
                    )
                })?;
                print!("{}", toml::to_string_pretty(&updated)?);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::too_many_arguments)]
fn apply_settings(
    settings: &mut AppSettings,
    ollama_url: Option<String>,
    model: Option<String>,
    source: Option<String>,
    target: Option<String>,
    log_level: Option<LogLevel>,
    close_behavior: Option<CloseBehavior>,
    show_close_confirmation: Option<bool>,
) {
    if let Some(url) = ollama_url {
        settings.ollama_url = url;
    }
    if let Some(model) = model {
        settings.default_model = model;
    }
    if let Some(source) = source {
        settings.default_source_lang = source.to_lowercase();
    }
    if let Some(target) = target {
        settings.default_target_lang = target.to_lowercase();
    }
    if let Some(level) = log_level {
        settings.log_level = level;
    }
    if let Some(behavior) = close_behavior {
        settings.close_behavior = behavior;
    }
    if let Some(confirm) = show_close_confirmation {
        settings.show_close_confirmation = confirm;
    }
}

/// Translate a document; `None` when cancelled.
async fn translate_file_command(
    app: &App,
    cancel: &CancellationToken,
    input: &Path,
    output: Option<PathBuf>,
    from: Option<&str>,
    to: Option<&str>,
) -> Option<FileTranslationResult> {
    let output = output.unwrap_or_else(|| default_output_path(input));
    let input_arg = path_arg(input);
    let output_arg = path_arg(&output);

    cancellable(cancel, app.files.translate_file(&input_arg, &output_arg, from, to)).await
}

/// Translate the text in an image; `None` when cancelled.
async fn translate_image_command(
    app: &App,
    cancel: &CancellationToken,
    input: &Path,
    from: &str,
    to: &str,
    model: &str,
) -> Option<TranslationResult> {
    let input_arg = path_arg(input);

    cancellable(cancel, app.images.translate_image(&input_arg, from, to, model)).await
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn failed(kind: ErrorKind) -> ExitCode {
    eprintln!("{}: {}", kind.as_str(), kind);
    ExitCode::FAILURE
}

fn cancelled() -> ExitCode {
    eprintln!("Cancelled");
    ExitCode::from(130)
}

fn progress_bar(model: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_prefix(model.to_string());
    Ok(bar)
}

async fn report_progress(mut rx: UnboundedReceiver<ModelPullProgress>, bar: ProgressBar) {
    while let Some(update) = rx.recv().await {
        if let Some(total) = update.total {
            bar.set_length(total);
        }
        if let Some(completed) = update.completed {
            bar.set_position(completed);
        }
        if let Some(status) = update.status {
            bar.set_message(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_app(dir: &TempDir) -> App {
        let store = Arc::new(SettingsStore::new(dir.path().join("settings.toml")));
        App::new(store).unwrap()
    }

    #[tokio::test]
    async fn test_file_command_reports_token() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("slides.rtf");
        std::fs::write(&input, "{\\rtf1 hello}").unwrap();
        let app = test_app(&dir);

        let outcome =
            translate_file_command(&app, &CancellationToken::new(), &input, None, None, Some("de")).await;

        assert_eq!(outcome, Some(Err(ErrorKind::FileUnsupported)));
        assert!(!dir.path().join("slides.translated.rtf").exists());
    }

    #[tokio::test]
    async fn test_image_command_reports_token() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir);

        let outcome = translate_image_command(
            &app,
            &CancellationToken::new(),
            &dir.path().join("missing.png"),
            "ja",
            "en",
            "gemma3:4b",
        )
        .await;

        assert_eq!(outcome, Some(Err(ErrorKind::ImageNotFound)));
    }

    #[tokio::test]
    async fn test_cancelled_command_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("note.txt");
        std::fs::write(&input, "hello").unwrap();
        let app = test_app(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = translate_file_command(&app, &cancel, &input, None, None, None).await;

        assert_eq!(outcome, None);
    }

    #[test]
    fn test_apply_settings_lowercases_languages() {
        let mut settings = AppSettings::default();
        apply_settings(
            &mut settings,
            None,
            Some("translategemma:27b".to_string()),
            Some("JA".to_string()),
            None,
            Some(LogLevel::Warning),
            None,
            Some(false),
        );

        assert_eq!(settings.default_model, "translategemma:27b");
        assert_eq!(settings.default_source_lang, "ja");
        assert_eq!(settings.default_target_lang, "ru");
        assert_eq!(settings.log_level, LogLevel::Warning);
        assert!(!settings.show_close_confirmation);
    }
}
