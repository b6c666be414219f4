use crate::app::open_file_service::{OpenOutcome, open_file};
use crate::bootstrap;
use crate::presentation::{SettingsShell, TerminalSelector, format_entries};
use anyhow::Context;
use clap::Parser;
use picker_i18n::{resolve_language, resolve_system_language, t};
use picker_platform::{RegistrationReport, SUPPORTED_EXTENSIONS};
use picker_protocol::{AppError, AppResult, ResultExt};
use picker_settings::PreferencesStore;
use picker_slicer::SlicerRegistry;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "slicer-picker",
    version,
    about = "Open 3D model files with the slicer of your choice"
)]
pub struct Cli {
    /// Model file to open. Without it the settings editor starts.
    pub file: Option<PathBuf>,
    /// Make this program the handler of the supported model file types.
    #[arg(long)]
    pub register_file_types: bool,
    /// Print the merged slicer list and exit.
    #[arg(long)]
    pub list: bool,
    /// Preferences file to use instead of ~/.slicer-picker/config.json.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let store = match bootstrap::resolve_store(cli.config.clone()) {
        Ok(store) => store,
        Err(error) => {
            eprintln!("{}", error.describe());
            return ExitCode::FAILURE;
        }
    };
    let runtime = bootstrap::init_runtime(store);

    let mut registry = match SlicerRegistry::open(runtime.store.clone()) {
        Ok(registry) => registry,
        Err(error) => {
            tracing::error!(event = "preferences_load_failed", code = %error.code);
            eprintln!("{}", error.describe());
            return ExitCode::FAILURE;
        }
    };
    let language = resolve_language(registry.language());

    if cli.register_file_types {
        return register_file_types(language);
    }
    if cli.list {
        return list_entries(&mut registry, language);
    }
    match cli.file {
        Some(file) => open_with_selector(&mut registry, &file, language),
        None => run_settings(&mut registry),
    }
}

fn open_with_selector<S: PreferencesStore>(
    registry: &mut SlicerRegistry<S>,
    file: &std::path::Path,
    language: &str,
) -> ExitCode {
    let stdin = io::stdin();
    let mut selector = TerminalSelector::new(stdin.lock(), io::stdout(), language);

    match open_file(registry, file, &mut selector, picker_slicer::launch) {
        Ok(OpenOutcome::Launched(handle)) => {
            tracing::info!(event = "open_file_done", pid = handle.pid);
            ExitCode::SUCCESS
        }
        Ok(OpenOutcome::Cancelled) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(
                event = "open_file_failed",
                code = %error.code,
                detail = %error.describe()
            );
            eprintln!("{}", failure_message(&error, language));
            ExitCode::FAILURE
        }
    }
}

/// Terminal wording of an open-file failure.
pub fn failure_message(error: &AppError, language: &str) -> String {
    match error.code.as_str() {
        "file_not_found" => format!(
            "{}: {}",
            t(language, "error.file_not_found"),
            error.context_value("path").unwrap_or_default()
        ),
        "no_slicers_available" => t(language, "error.no_slicers"),
        "slicer_launch_failed" => {
            let reason = if error.causes.is_empty() {
                error.message.clone()
            } else {
                error.causes.join(": ")
            };
            format!("{}: {reason}", t(language, "error.launch_failed"))
        }
        _ => error.describe(),
    }
}

fn list_entries<S: PreferencesStore>(registry: &mut SlicerRegistry<S>, language: &str) -> ExitCode {
    match registry.resolve_all() {
        Ok(entries) => {
            for line in format_entries(&entries, language) {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", error.describe());
            ExitCode::FAILURE
        }
    }
}

fn register_current_executable() -> AppResult<RegistrationReport> {
    let app_path = std::env::current_exe()
        .context("failed to locate the running executable")
        .with_code(
            "association_app_path_failed",
            "Cannot locate the running executable",
        )?;
    picker_platform::register(&SUPPORTED_EXTENSIONS, &app_path)
}

fn register_file_types(language: &str) -> ExitCode {
    match register_current_executable() {
        Ok(report) => {
            for step in &report.steps {
                println!("  {step}");
            }
            println!("{}", t(language, "settings.registered"));
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", error.describe());
            ExitCode::FAILURE
        }
    }
}

fn run_settings<S: PreferencesStore>(registry: &mut SlicerRegistry<S>) -> ExitCode {
    let stdin = io::stdin();
    let mut shell = SettingsShell::new(registry, stdin.lock(), io::stdout())
        .with_registrar(register_current_executable);

    match shell.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!(
                "{}: {}",
                t(resolve_system_language(), "settings"),
                error.describe()
            );
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[path = "../tests/cli/cli_tests.rs"]
mod tests;
