use anyhow::Context;
use picker_protocol::{AppError, AppResult, ResultExt};
use picker_slicer::Platform;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const SUPPORTED_EXTENSIONS: [&str; 12] = [
    "3mf", "step", "stl", "svg", "obj", "amf", "usd", "usda", "usdc", "abc", "ply", "sla",
];
pub const DESKTOP_ENTRY_FILE_NAME: &str = "slicer-picker.desktop";
pub const PROG_ID_PREFIX: &str = "SlicerPicker";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
const WINDOWS_CLASSES_ROOT: &str = r"HKCU\Software\Classes";

pub fn mime_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "3mf" => "model/3mf",
        "step" => "application/step",
        "stl" => "model/stl",
        "svg" => "image/svg+xml",
        "obj" => "model/obj",
        "amf" => "application/x-amf",
        "usd" | "usda" | "usdc" => "model/vnd.usd",
        "abc" => "application/x-abc",
        "ply" => "model/ply",
        "sla" => "application/x-sla",
        _ => FALLBACK_MIME_TYPE,
    }
}

/// Distinct MIME types of `extensions`, first occurrence wins.
pub fn mime_types_for(extensions: &[&str]) -> Vec<&'static str> {
    let mut types: Vec<&'static str> = Vec::new();
    for extension in extensions {
        let mime = mime_type_for(extension);
        if !types.contains(&mime) {
            types.push(mime);
        }
    }
    types
}

/// Runs one external registration tool. Failures come back as text so they
/// can be recorded in the report.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), String>;
}

pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), String> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| format!("failed to run '{program}': {error}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("'{program}' exited with {status}"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStep {
    pub action: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Display for RegistrationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mark = if self.ok { "ok" } else { "failed" };
        match &self.detail {
            Some(detail) => write!(f, "[{mark}] {} ({detail})", self.action),
            None => write!(f, "[{mark}] {}", self.action),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReport {
    pub platform: String,
    pub steps: Vec<RegistrationStep>,
}

impl RegistrationReport {
    fn new(platform: Platform) -> Self {
        Self {
            platform: platform.as_str().to_string(),
            steps: Vec::new(),
        }
    }

    fn record(&mut self, action: String, result: Result<(), String>) {
        match &result {
            Ok(()) => tracing::debug!(event = "file_association_step_ok", action = %action),
            Err(detail) => tracing::warn!(
                event = "file_association_step_failed",
                action = %action,
                detail = %detail
            ),
        }
        self.steps.push(RegistrationStep {
            action,
            ok: result.is_ok(),
            detail: result.err(),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &RegistrationStep> {
        self.steps.iter().filter(|step| !step.ok)
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|step| step.ok)
    }
}

/// Makes this program the handler of `extensions` for the current user.
///
/// Registration is best effort: failing helper tools are recorded in the
/// report. Only problems that prevent any registration at all, such as a
/// missing home directory on Linux, are returned as errors.
pub fn register(extensions: &[&str], app_path: &Path) -> AppResult<RegistrationReport> {
    register_with(
        Platform::current(),
        extensions,
        app_path,
        &SystemCommandRunner,
    )
}

pub fn register_with(
    platform: Platform,
    extensions: &[&str],
    app_path: &Path,
    runner: &dyn CommandRunner,
) -> AppResult<RegistrationReport> {
    tracing::info!(
        event = "file_association_register_start",
        platform = platform.as_str(),
        app_path = %app_path.display(),
        extension_count = extensions.len()
    );

    let report = match platform {
        Platform::Linux => {
            let home = picker_settings::home_dir().ok_or_else(|| {
                AppError::new(
                    "association_home_dir_unavailable",
                    "Cannot locate the user home directory",
                )
            })?;
            let applications_dir = home.join(".local").join("share").join("applications");
            register_linux(&applications_dir, extensions, app_path, runner)?
        }
        Platform::MacOs => register_macos(extensions, app_path, runner),
        Platform::Windows => register_windows(extensions, app_path, runner),
    };

    tracing::info!(
        event = "file_association_register_done",
        steps = report.steps.len(),
        failures = report.failures().count()
    );
    Ok(report)
}

fn desktop_exec_path(app_path: &Path) -> String {
    let text = app_path.display().to_string();
    if text.contains(char::is_whitespace) || text.contains('"') {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

/// The selector runs in a terminal, hence `Terminal=true`.
pub fn desktop_entry_content(app_path: &Path, extensions: &[&str]) -> String {
    let mut mime_types = mime_types_for(extensions).join(";");
    if !mime_types.is_empty() {
        mime_types.push(';');
    }
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Slicer Picker\n\
         Comment=Open 3D models with a chosen slicer\n\
         Exec={} %f\n\
         Terminal=true\n\
         Categories=Graphics;3DGraphics;\n\
         MimeType={mime_types}\n",
        desktop_exec_path(app_path)
    )
}

pub fn register_linux(
    applications_dir: &Path,
    extensions: &[&str],
    app_path: &Path,
    runner: &dyn CommandRunner,
) -> AppResult<RegistrationReport> {
    let mut report = RegistrationReport::new(Platform::Linux);

    fs::create_dir_all(applications_dir)
        .with_context(|| {
            format!(
                "failed to create applications directory: {}",
                applications_dir.display()
            )
        })
        .with_code(
            "association_dir_create_failed",
            "Failed to create applications directory",
        )
        .with_ctx("path", applications_dir.display().to_string())?;

    let desktop_file: PathBuf = applications_dir.join(DESKTOP_ENTRY_FILE_NAME);
    fs::write(&desktop_file, desktop_entry_content(app_path, extensions))
        .with_context(|| format!("failed to write desktop entry: {}", desktop_file.display()))
        .with_code(
            "association_desktop_entry_write_failed",
            "Failed to write desktop entry",
        )
        .with_ctx("path", desktop_file.display().to_string())?;
    report.record(format!("write {}", desktop_file.display()), Ok(()));

    let database_args = vec![applications_dir.display().to_string()];
    report.record(
        "update-desktop-database".to_string(),
        runner.run("update-desktop-database", &database_args),
    );

    for mime in mime_types_for(extensions) {
        let args = vec![
            "default".to_string(),
            DESKTOP_ENTRY_FILE_NAME.to_string(),
            mime.to_string(),
        ];
        report.record(format!("xdg-mime default {mime}"), runner.run("xdg-mime", &args));
    }

    Ok(report)
}

pub fn duti_args(app_path: &Path, extension: &str) -> Vec<String> {
    vec![
        "-s".to_string(),
        app_path.display().to_string(),
        format!(".{extension}"),
        "all".to_string(),
    ]
}

fn register_macos(
    extensions: &[&str],
    app_path: &Path,
    runner: &dyn CommandRunner,
) -> RegistrationReport {
    let mut report = RegistrationReport::new(Platform::MacOs);
    for extension in extensions {
        report.record(
            format!("duti .{extension}"),
            runner.run("duti", &duti_args(app_path, extension)),
        );
    }
    report
}

pub fn prog_id(extension: &str) -> String {
    format!("{PROG_ID_PREFIX}.{extension}")
}

/// `reg add` argument lists for one extension: the extension key, the ProgID
/// description and the open command.
pub fn windows_registry_commands(app_path: &Path, extension: &str) -> Vec<Vec<String>> {
    let prog_id = prog_id(extension);
    let reg_add = |key: String, value: String| {
        vec![
            "add".to_string(),
            key,
            "/ve".to_string(),
            "/d".to_string(),
            value,
            "/f".to_string(),
        ]
    };

    vec![
        reg_add(
            format!(r"{WINDOWS_CLASSES_ROOT}\.{extension}"),
            prog_id.clone(),
        ),
        reg_add(
            format!(r"{WINDOWS_CLASSES_ROOT}\{prog_id}"),
            format!("{} File", extension.to_ascii_uppercase()),
        ),
        reg_add(
            format!(r"{WINDOWS_CLASSES_ROOT}\{prog_id}\shell\open\command"),
            format!("\"{}\" \"%1\"", app_path.display()),
        ),
    ]
}

fn register_windows(
    extensions: &[&str],
    app_path: &Path,
    runner: &dyn CommandRunner,
) -> RegistrationReport {
    let mut report = RegistrationReport::new(Platform::Windows);
    for extension in extensions {
        for args in windows_registry_commands(app_path, extension) {
            let action = format!("reg add {}", args.get(1).map(String::as_str).unwrap_or(""));
            report.record(action, runner.run("reg", &args));
        }
    }
    report
}

#[cfg(test)]
#[path = "../tests/core/registrar_tests.rs"]
mod tests;
