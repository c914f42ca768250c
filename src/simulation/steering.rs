//! Sources of between-round steering input

use colored::*;
use std::io::{self, BufRead, StdinLock, Write};

/// Supplies optional user text after each round
pub trait SteeringSource {
    /// Next steering text, `None` for no input. Blank text is ignored by the loop.
    fn next_steering(&mut self, round: usize) -> Option<String>;
}

/// Never steers (non-interactive runs)
#[derive(Debug, Default)]
pub struct NoSteering;

impl SteeringSource for NoSteering {
    fn next_steering(&mut self, _round: usize) -> Option<String> {
        None
    }
}

/// Prompts on stderr and blocks for one line of input
pub struct ConsoleSteering<R: BufRead> {
    reader: R,
}

impl ConsoleSteering<StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> ConsoleSteering<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> SteeringSource for ConsoleSteering<R> {
    fn next_steering(&mut self, round: usize) -> Option<String> {
        eprint!(
            "\n{} {} ",
            format!("[round {}]", round + 1).dimmed(),
            "Enter a new prompt to steer the conversation (or press Enter to continue):".yellow()
        );
        if let Err(e) = io::stderr().flush() {
            log::debug!("Failed to flush steering prompt: {}", e);
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                log::debug!("Steering input closed (EOF)");
                None
            }
            Ok(_) => Some(line),
            Err(e) => {
                log::warn!("Failed to read steering input: {}", e);
                None
            }
        }
    }
}
