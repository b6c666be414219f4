use crate::presentation::Selector;
use picker_protocol::models::ResolvedEntry;
use picker_protocol::{AppError, AppResult};
use picker_settings::PreferencesStore;
use picker_slicer::{LaunchHandle, SlicerRegistry};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Launched(LaunchHandle),
    Cancelled,
}

/// Lets the user pick an enabled slicer for `file` and starts it.
///
/// The file is checked before anything is shown, and an empty candidate list
/// is an error rather than an empty prompt.
pub fn open_file<S, P, L>(
    registry: &mut SlicerRegistry<S>,
    file: &Path,
    selector: &mut P,
    launch: L,
) -> AppResult<OpenOutcome>
where
    S: PreferencesStore,
    P: Selector + ?Sized,
    L: FnOnce(&ResolvedEntry, &Path) -> AppResult<LaunchHandle>,
{
    if !file.exists() {
        return Err(AppError::new("file_not_found", "File not found")
            .with_context("path", file.display().to_string()));
    }

    let entries = registry.resolve_enabled()?;
    if entries.is_empty() {
        return Err(AppError::new(
            "no_slicers_available",
            "No slicers available",
        ));
    }
    tracing::debug!(
        event = "open_file_candidates",
        file = %file.display(),
        count = entries.len()
    );

    let Some(index) = selector.present(file, &entries)? else {
        tracing::info!(event = "open_file_cancelled", file = %file.display());
        return Ok(OpenOutcome::Cancelled);
    };
    let entry = entries.get(index).ok_or_else(|| {
        AppError::new("selection_out_of_range", "Selected slicer does not exist")
            .with_context("index", index.to_string())
    })?;

    launch(entry, file).map(OpenOutcome::Launched)
}

#[cfg(test)]
#[path = "../../tests/app/open_file_service_tests.rs"]
mod tests;
