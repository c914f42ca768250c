//! Real-time observation of a run

use colored::*;
use std::io::{self, Stderr, Stdout, Write};
use terminal_size::{Width, terminal_size};

use super::ResponseRecord;

/// Hooks fired as the loop progresses. Nothing here feeds back into the run.
pub trait TurnObserver {
    fn round_started(&mut self, _round: usize, _total: usize) {}
    fn responded(&mut self, _record: &ResponseRecord) {}
    fn passed(&mut self, _round: usize, _persona: &str) {}
    fn steered(&mut self, _round: usize, _text: &str) {}
}

/// Observes nothing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct SilentObserver;

#[cfg(test)]
impl TurnObserver for SilentObserver {}

/// Prints each turn as it happens: to stdout for text runs, to stderr when
/// stdout carries a json/yaml report
pub struct ConsoleObserver<W: Write> {
    out: W,
    width: usize,
}

impl ConsoleObserver<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl ConsoleObserver<Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: get_terminal_width(),
        }
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            log::debug!("Failed to write turn output: {}", e);
        }
    }
}

impl<W: Write> TurnObserver for ConsoleObserver<W> {
    fn round_started(&mut self, round: usize, total: usize) {
        self.emit("");
        self.emit(&format!("── Round {}/{} ──", round + 1, total).bold().to_string());
    }

    fn responded(&mut self, record: &ResponseRecord) {
        self.emit("");
        self.emit(&format!("{} says:", record.persona.green().bold()));
        for paragraph in record.text.lines() {
            for line in wrap_text(paragraph, self.width) {
                self.emit(&line);
            }
        }
    }

    fn passed(&mut self, _round: usize, persona: &str) {
        self.emit("");
        self.emit(&format!("{} {} failed to generate a response.", "✗".red(), persona.bold()));
    }

    fn steered(&mut self, _round: usize, text: &str) {
        self.emit(&format!("{} Steering: {}", "→".blue(), text.cyan()));
    }
}

/// Get terminal width, defaulting to 80 if not available
fn get_terminal_width() -> usize {
    terminal_size().map(|(Width(w), _)| w as usize).unwrap_or(80)
}

/// Wrap text to max_width, returning lines
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![s.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in s.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("a modern alarm clock with a soft sunrise light", 16);
        assert_eq!(lines, vec!["a modern alarm", "clock with a", "soft sunrise", "light"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 16));
    }

    #[test]
    fn test_wrap_text_long_word_and_empty() {
        assert_eq!(wrap_text("supercalifragilistic", 5), vec!["supercalifragilistic"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("keep as is", 0), vec!["keep as is"]);
    }

    #[test]
    fn test_console_observer_writes_turns_and_passes() {
        colored::control::set_override(false);
        let mut observer = ConsoleObserver::new(Vec::new());
        observer.width = 20;

        observer.round_started(0, 2);
        observer.responded(&ResponseRecord {
            persona: "Presenter".to_string(),
            round: 0,
            text: "Lead with the sunrise light feature".to_string(),
        });
        observer.passed(0, "Client");
        observer.steered(0, "cheaper please");

        let output = String::from_utf8(observer.out).unwrap();
        assert!(output.contains("Round 1/2"));
        assert!(output.contains("Presenter says:\nLead with the\nsunrise light\nfeature\n"));
        assert!(output.contains("Client failed to generate a response."));
        assert!(output.contains("Steering: cheaper please"));
    }

    #[test]
    fn test_silent_observer_accepts_all_hooks() {
        let mut observer = SilentObserver;
        let record = ResponseRecord {
            persona: "Client".to_string(),
            round: 0,
            text: "hi".to_string(),
        };
        observer.round_started(0, 1);
        observer.responded(&record);
        observer.passed(0, "Client");
        observer.steered(0, "go");
    }
}
