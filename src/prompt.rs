// The yes/no gate shown once before the tick loop starts.
// Declining either question ends the program before any payload runs.

use std::io::{BufRead, Write};

pub trait Prompt {
    /// Ask a yes/no question; anything but an explicit yes counts as no.
    fn confirm(&mut self, title: &str, message: &str) -> bool;
}

const QUESTIONS: [(&str, &str); 2] = [
    (
        "Flashing effects",
        "This program scrambles the contents of its window with rapidly flashing effects. Continue?",
    ),
    ("Are you sure?", "Last chance: the effects keep going until the audio ends or you press ESC."),
];

/// Both questions must be answered yes.
pub fn ask_to_start(prompt: &mut dyn Prompt) -> bool {
    QUESTIONS.iter().all(|(title, message)| prompt.confirm(title, message))
}

/// Reads answers from any line source (stdin in practice).
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn confirm(&mut self, title: &str, message: &str) -> bool {
        if write!(self.output, "[{title}] {message} [y/N] ").and_then(|_| self.output.flush()).is_err() {
            return false;
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                log::warn!("reading answer: {e}");
                false
            }
        }
    }
}
