use crate::catalog::Platform;
use anyhow::Context;
use picker_protocol::models::ResolvedEntry;
use picker_protocol::{AppResult, ResultExt};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const MACOS_OPEN_PROGRAM: &str = "open";

/// What will be executed for one launch, computed without touching the
/// process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
}

/// A spawned slicer. The child is never waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchHandle {
    pub pid: u32,
    pub detached: bool,
}

fn is_app_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case("app"))
}

/// The `.app` directory containing `path`, or `path` itself when it is one.
pub fn bundle_root(path: &Path) -> Option<&Path> {
    path.ancestors().find(|candidate| is_app_bundle(candidate))
}

/// The file is passed as an absolute path so a `working_dir` on the entry
/// does not change what it refers to.
pub fn plan_launch(entry: &ResolvedEntry, file: &Path, platform: Platform) -> LaunchPlan {
    let file = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    let working_dir = entry
        .working_dir
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    let path = Path::new(&entry.path);

    if platform == Platform::MacOs
        && let Some(bundle) = bundle_root(path)
    {
        return LaunchPlan {
            program: PathBuf::from(MACOS_OPEN_PROGRAM),
            args: vec![
                OsString::from("-a"),
                bundle.as_os_str().to_os_string(),
                file.as_os_str().to_os_string(),
            ],
            working_dir,
        };
    }

    let mut args: Vec<OsString> = entry.arguments.iter().map(OsString::from).collect();
    args.push(file.as_os_str().to_os_string());
    LaunchPlan {
        program: path.to_path_buf(),
        args,
        working_dir,
    }
}

pub fn spawn_plan(plan: &LaunchPlan) -> AppResult<LaunchHandle> {
    let mut command = Command::new(&plan.program);
    command
        .args(&plan.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(dir) = &plan.working_dir {
        command.current_dir(dir);
    }

    let child = command
        .spawn()
        .with_context(|| format!("failed to spawn {}", plan.program.display()))
        .with_code("slicer_launch_failed", "Failed to launch slicer")
        .with_ctx("program", plan.program.display().to_string())?;

    Ok(LaunchHandle {
        pid: child.id(),
        detached: true,
    })
}

/// Starts the slicer of `entry` on `file` and returns right away.
pub fn launch(entry: &ResolvedEntry, file: &Path) -> AppResult<LaunchHandle> {
    let plan = plan_launch(entry, file, Platform::current());
    tracing::info!(
        event = "slicer_launch_requested",
        slicer_id = %entry.id,
        program = %plan.program.display(),
        arg_count = plan.args.len()
    );

    let handle = spawn_plan(&plan).map_err(|error| error.with_context("slicerId", &entry.id))?;
    tracing::info!(
        event = "slicer_launched",
        slicer_id = %entry.id,
        pid = handle.pid
    );
    Ok(handle)
}

#[cfg(test)]
#[path = "../tests/core/launch_tests.rs"]
mod tests;
