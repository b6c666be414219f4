use anyhow::Context;
use picker_i18n::t;
use picker_protocol::models::ResolvedEntry;
use picker_protocol::{AppResult, ResultExt};
use std::io::{BufRead, Write};
use std::path::Path;

const CANCEL_WORDS: [&str; 4] = ["q", "quit", "c", "cancel"];

/// Asks the user which of `entries` should open `file`.
///
/// Returns the index of the chosen entry, or `None` when the user cancels.
pub trait Selector {
    fn present(&mut self, file: &Path, entries: &[ResolvedEntry]) -> AppResult<Option<usize>>;
}

/// Numbered-list selector on a line-oriented terminal.
pub struct TerminalSelector<R, W> {
    input: R,
    output: W,
    language: String,
}

impl<R: BufRead, W: Write> TerminalSelector<R, W> {
    pub fn new(input: R, output: W, language: impl Into<String>) -> Self {
        Self {
            input,
            output,
            language: language.into(),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn render(&mut self, file: &Path, entries: &[ResolvedEntry]) -> std::io::Result<()> {
        writeln!(self.output, "{}", t(&self.language, "open_in"))?;
        writeln!(self.output, "  {}", file.display())?;
        writeln!(self.output)?;
        writeln!(self.output, "{}", t(&self.language, "choose_slicer"))?;
        for (index, entry) in entries.iter().enumerate() {
            let marker = if index == 0 { "*" } else { " " };
            writeln!(self.output, " {marker}{:>2}) {}", index + 1, entry.name)?;
        }
        Ok(())
    }

    fn prompt(&mut self) -> std::io::Result<Option<String>> {
        write!(self.output, "{}: ", t(&self.language, "selector.prompt"))?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Selector for TerminalSelector<R, W> {
    fn present(&mut self, file: &Path, entries: &[ResolvedEntry]) -> AppResult<Option<usize>> {
        if entries.is_empty() {
            return Ok(None);
        }

        self.render(file, entries)
            .context("failed to render selector")
            .with_code("terminal_io_failed", "Terminal output failed")?;

        loop {
            let answer = self
                .prompt()
                .context("failed to read selection")
                .with_code("terminal_io_failed", "Terminal input failed")?;
            let Some(answer) = answer else {
                tracing::debug!(event = "selector_input_closed");
                return Ok(None);
            };

            if answer.is_empty() {
                return Ok(Some(0));
            }
            if CANCEL_WORDS.contains(&answer.to_ascii_lowercase().as_str()) {
                return Ok(None);
            }
            if let Ok(number) = answer.parse::<usize>()
                && (1..=entries.len()).contains(&number)
            {
                return Ok(Some(number - 1));
            }

            writeln!(self.output, "{}", t(&self.language, "selector.invalid"))
                .context("failed to render selector")
                .with_code("terminal_io_failed", "Terminal output failed")?;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/presentation/selector_tests.rs"]
mod tests;
