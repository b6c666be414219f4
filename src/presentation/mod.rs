pub mod selector;
pub mod settings;

pub use selector::{Selector, TerminalSelector};
pub use settings::{SettingsShell, format_entries};
