use anyhow::Context;
use picker_i18n::{SUPPORTED_LANGUAGES, language_name_key, resolve_language, t};
use picker_platform::RegistrationReport;
use picker_protocol::models::ResolvedEntry;
use picker_protocol::{AppError, AppResult, ResultExt};
use picker_settings::PreferencesStore;
use picker_slicer::SlicerRegistry;
use std::io::{BufRead, Write};
use std::path::Path;

type Registrar<'a> = Box<dyn FnMut() -> AppResult<RegistrationReport> + 'a>;

/// Optional `--name/--path/--args/--cwd` values of `edit` and `add`.
#[derive(Debug, Default, PartialEq, Eq)]
struct EntryFlags {
    name: Option<String>,
    path: Option<String>,
    arguments: Option<Vec<String>>,
    working_dir: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Line-oriented settings editor. Every change goes straight through the
/// registry, which persists it before the next prompt.
pub struct SettingsShell<'a, S: PreferencesStore, R, W> {
    registry: &'a mut SlicerRegistry<S>,
    input: R,
    output: W,
    registrar: Option<Registrar<'a>>,
}

impl<'a, S: PreferencesStore, R: BufRead, W: Write> SettingsShell<'a, S, R, W> {
    pub fn new(registry: &'a mut SlicerRegistry<S>, input: R, output: W) -> Self {
        Self {
            registry,
            input,
            output,
            registrar: None,
        }
    }

    pub fn with_registrar(
        mut self,
        registrar: impl FnMut() -> AppResult<RegistrationReport> + 'a,
    ) -> Self {
        self.registrar = Some(Box::new(registrar));
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn language(&self) -> &'static str {
        resolve_language(self.registry.language())
    }

    fn text(&self, key: &str) -> String {
        t(self.language(), key)
    }

    pub fn run(&mut self) -> AppResult<()> {
        self.write_line(&format!(
            "{} - {}",
            self.text("app_title"),
            self.text("settings")
        ))?;
        self.print_list()?;

        loop {
            let prompt = format!("{}> ", self.text("settings.prompt"));
            write!(self.output, "{prompt}")
                .and_then(|_| self.output.flush())
                .context("failed to write prompt")
                .with_code("terminal_io_failed", "Terminal output failed")?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("failed to read command")
                .with_code("terminal_io_failed", "Terminal input failed")?;
            if read == 0 {
                self.write_line("")?;
                return Ok(());
            }

            if self.execute(line.trim())? == Flow::Quit {
                return Ok(());
            }
        }
    }

    fn execute(&mut self, line: &str) -> AppResult<Flow> {
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some(tokens) = shlex::split(line) else {
            self.write_line(&format!("{}: {line}", self.text("settings.unknown_command")))?;
            return Ok(Flow::Continue);
        };
        let Some((command, rest)) = tokens.split_first() else {
            return Ok(Flow::Continue);
        };

        tracing::debug!(event = "settings_command", command = %command);
        let result = match command.to_ascii_lowercase().as_str() {
            "list" | "ls" => self.print_list(),
            "enable" => self.toggle(rest, true),
            "disable" => self.toggle(rest, false),
            "up" => self.move_entry(rest, true),
            "down" => self.move_entry(rest, false),
            "swap" => self.swap(rest),
            "edit" => self.edit(rest),
            "add" => self.add(rest),
            "remove" | "rm" => self.remove(rest),
            "lang" | "language" => self.change_language(rest),
            "register" => self.register(),
            "about" => self.about(),
            "help" | "?" => self.write_line(&self.text("settings.help")),
            "quit" | "exit" | "q" => return Ok(Flow::Quit),
            _ => Err(AppError::new("unknown_command", self.text("settings.unknown_command"))
                .with_context("command", command.as_str())),
        };

        match result {
            Ok(()) => {}
            Err(error) if error.code == "terminal_io_failed" => return Err(error),
            Err(error) => {
                tracing::warn!(
                    event = "settings_command_failed",
                    command = %command,
                    code = %error.code,
                    detail = %error.describe()
                );
                self.write_line(&format!("! {}", error.describe()))?;
            }
        }
        Ok(Flow::Continue)
    }

    fn write_line(&mut self, text: &str) -> AppResult<()> {
        writeln!(self.output, "{text}")
            .context("failed to write settings output")
            .with_code("terminal_io_failed", "Terminal output failed")
    }

    fn saved(&mut self) -> AppResult<()> {
        self.write_line(&self.text("settings.saved"))
    }

    fn entries(&mut self) -> AppResult<Vec<ResolvedEntry>> {
        self.registry.resolve_all()
    }

    /// Resolves a 1-based list number into the current entry at that spot.
    fn entry_at(&mut self, token: Option<&String>) -> AppResult<(usize, ResolvedEntry)> {
        let message = self.text("settings.invalid_index");
        let invalid = || {
            AppError::new("invalid_index", message.as_str())
                .with_context("index", token.cloned().unwrap_or_default())
        };
        let number = token
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value >= 1)
            .ok_or_else(invalid)?;
        let index = number - 1;
        let entry = self.entries()?.into_iter().nth(index).ok_or_else(invalid)?;
        Ok((index, entry))
    }

    fn print_list(&mut self) -> AppResult<()> {
        let entries = self.entries()?;
        let language = self.language();
        for line in format_entries(&entries, language) {
            self.write_line(&line)?;
        }
        Ok(())
    }

    fn toggle(&mut self, rest: &[String], enabled: bool) -> AppResult<()> {
        let (_, entry) = self.entry_at(rest.first())?;
        self.registry.set_enabled(&entry.id, enabled)?;
        self.saved()
    }

    fn move_entry(&mut self, rest: &[String], up: bool) -> AppResult<()> {
        let (index, _) = self.entry_at(rest.first())?;
        if up {
            self.registry.move_up(index)?;
        } else {
            self.registry.move_down(index)?;
        }
        self.print_list()
    }

    fn swap(&mut self, rest: &[String]) -> AppResult<()> {
        let (first, _) = self.entry_at(rest.first())?;
        let (second, _) = self.entry_at(rest.get(1))?;
        self.registry.swap_order(first, second)?;
        self.print_list()
    }

    fn edit(&mut self, rest: &[String]) -> AppResult<()> {
        let (_, mut entry) = self.entry_at(rest.first())?;
        let (positional, flags) = parse_entry_flags(rest.get(1..).unwrap_or_default())?;
        if let Some(extra) = positional.first() {
            return Err(
                AppError::new("unknown_command", self.text("settings.unknown_command"))
                    .with_context("argument", extra.as_str()),
            );
        }

        if let Some(name) = flags.name {
            if !entry.is_custom {
                return Err(AppError::new(
                    "builtin_name_locked",
                    self.text("settings.builtin_name"),
                ));
            }
            entry.name = name;
        }
        if let Some(path) = flags.path {
            entry.path = path;
        }
        if let Some(arguments) = flags.arguments {
            entry.arguments = arguments;
        }
        if let Some(working_dir) = flags.working_dir {
            entry.working_dir = Some(working_dir).filter(|value| !value.trim().is_empty());
        }

        self.registry.update_entry(&entry)?;
        self.saved()
    }

    fn add(&mut self, rest: &[String]) -> AppResult<()> {
        let (positional, flags) = parse_entry_flags(rest)?;
        let name = positional.first().map(String::as_str).unwrap_or_default();
        let path = positional.get(1).map(String::as_str).unwrap_or_default();
        self.registry.add_custom_entry(
            name,
            path,
            flags.arguments.unwrap_or_default(),
            flags.working_dir,
        )?;
        self.print_list()
    }

    fn remove(&mut self, rest: &[String]) -> AppResult<()> {
        let (_, entry) = self.entry_at(rest.first())?;
        if !entry.is_custom {
            return Err(AppError::new("not_custom", self.text("settings.not_custom"))
                .with_context("slicerId", entry.id));
        }
        self.registry.remove_custom_entry(&entry.id)?;
        self.print_list()
    }

    fn change_language(&mut self, rest: &[String]) -> AppResult<()> {
        let Some(code) = rest.first() else {
            let current = self.language();
            self.write_line(&format!(
                "{}: {}",
                self.text("settings.current_language"),
                language_label(current)
            ))?;
            for code in SUPPORTED_LANGUAGES {
                self.write_line(&format!("  {code}  {}", language_label_in(current, code)))?;
            }
            return Ok(());
        };

        if let Err(error) = self.registry.set_language(code) {
            if error.code == "unsupported_language" {
                return Err(AppError::new(
                    "unsupported_language",
                    self.text("settings.language_unsupported"),
                )
                .with_context("language", code.as_str()));
            }
            return Err(error);
        }
        let current = self.language();
        self.write_line(&format!(
            "{}: {}",
            self.text("settings.language_changed"),
            language_label(current)
        ))
    }

    fn register(&mut self) -> AppResult<()> {
        let message = self.text("settings.unknown_command");
        let Some(registrar) = self.registrar.as_mut() else {
            return Err(AppError::new("unknown_command", message));
        };
        let report = registrar()?;
        for step in &report.steps {
            self.write_line(&format!("  {step}"))?;
        }
        self.write_line(&self.text("settings.registered"))
    }

    fn about(&mut self) -> AppResult<()> {
        self.write_line(&self.text("app_title"))?;
        self.write_line(&format!(
            "{} {}",
            self.text("version"),
            env!("CARGO_PKG_VERSION")
        ))?;
        self.write_line(&self.text("about_text"))
    }
}

fn language_label(code: &str) -> String {
    language_label_in(code, code)
}

fn language_label_in(display_language: &str, code: &str) -> String {
    language_name_key(code)
        .map(|key| t(display_language, key))
        .unwrap_or_else(|| code.to_string())
}

/// Splits `tokens` into positional words and the entry flags.
fn parse_entry_flags(tokens: &[String]) -> AppResult<(Vec<String>, EntryFlags)> {
    let mut positional = Vec::new();
    let mut flags = EntryFlags::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        let slot = match token.as_str() {
            "--name" => &mut flags.name,
            "--path" => &mut flags.path,
            "--cwd" => &mut flags.working_dir,
            "--args" => {
                let value = iter.next().ok_or_else(|| missing_flag_value(token))?;
                let arguments = shlex::split(value).ok_or_else(|| {
                    AppError::new("invalid_arguments", "Unbalanced quotes in arguments")
                        .with_context("value", value.as_str())
                })?;
                flags.arguments = Some(arguments);
                continue;
            }
            _ => {
                positional.push(token.clone());
                continue;
            }
        };
        let value = iter.next().ok_or_else(|| missing_flag_value(token))?;
        *slot = Some(value.clone());
    }

    Ok((positional, flags))
}

fn missing_flag_value(flag: &str) -> AppError {
    AppError::new("missing_flag_value", "Flag needs a value").with_context("flag", flag)
}

/// One display line per entry: number, enabled box, name, path and markers.
pub fn format_entries(entries: &[ResolvedEntry], language: &str) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mark = if entry.enabled { "x" } else { " " };
            let mut line = format!("{:>3}. [{mark}] {}", index + 1, entry.name);
            if entry.is_custom {
                line.push_str(&format!(" ({})", t(language, "custom")));
            }
            line.push_str(&format!("  {}", entry.path));
            if entry.path.trim().is_empty() || !Path::new(&entry.path).exists() {
                line.push_str(&format!("  [{}]", t(language, "missing")));
            }
            if !entry.arguments.is_empty() {
                line.push_str(&format!(
                    "  {}: {}",
                    t(language, "arguments"),
                    shlex::try_join(entry.arguments.iter().map(String::as_str))
                        .unwrap_or_else(|_| entry.arguments.join(" "))
                ));
            }
            if let Some(dir) = &entry.working_dir {
                line.push_str(&format!("  {}: {dir}", t(language, "working_directory")));
            }
            line
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/presentation/settings_tests.rs"]
mod tests;
