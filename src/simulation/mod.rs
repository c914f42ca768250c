//! The conversation loop
//!
//! Personas take turns strictly in list order, round after round, over one
//! shared append-only transcript. Between rounds a steering source may add a
//! user message. A persona whose backend produced nothing simply passes.

pub mod observer;
pub mod steering;

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::completion::Message;
use crate::persona::Persona;

#[cfg(test)]
pub use observer::SilentObserver;
pub use observer::{ConsoleObserver, TurnObserver};
pub use steering::{ConsoleSteering, NoSteering, SteeringSource};

/// Append-only conversation history shared by every persona in a run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// What one persona said in one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseRecord {
    pub persona: String,
    /// Zero-based round index
    pub round: usize,
    pub text: String,
}

/// Cooperative stop request, checked between turns
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct Outcome {
    pub responses: Vec<ResponseRecord>,
    pub transcript: Transcript,
    /// The run stopped early because its cancel flag was raised
    pub cancelled: bool,
}

/// Drives personas through rounds
pub struct Simulation<'a> {
    steering: &'a mut dyn SteeringSource,
    observer: &'a mut dyn TurnObserver,
    cancel: CancelFlag,
}

impl<'a> Simulation<'a> {
    pub fn new(steering: &'a mut dyn SteeringSource, observer: &'a mut dyn TurnObserver) -> Self {
        Self {
            steering,
            observer,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&mut self, personas: &[Persona], opening_text: &str, rounds: usize, temperature: f32) -> Outcome {
        let mut transcript = Transcript::new();
        transcript.push(Message::user(opening_text));

        let mut responses = Vec::new();
        let mut cancelled = false;

        log::info!(
            "Starting simulation: {} personas, {} rounds, temperature {}",
            personas.len(),
            rounds,
            temperature
        );

        'rounds: for round in 0..rounds {
            self.observer.round_started(round, rounds);

            for persona in personas {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'rounds;
                }

                match persona.respond(transcript.as_slice(), temperature) {
                    Some(text) => {
                        transcript.push(Message::assistant(text.as_str()));
                        let record = ResponseRecord {
                            persona: persona.name().to_string(),
                            round,
                            text,
                        };
                        self.observer.responded(&record);
                        responses.push(record);
                    }
                    None => {
                        log::info!("Round {}: {} passed", round + 1, persona.name());
                        self.observer.passed(round, persona.name());
                    }
                }
            }

            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if let Some(text) = self.steering.next_steering(round) {
                let text = text.trim();
                if !text.is_empty() {
                    log::info!("Round {}: steering input added", round + 1);
                    transcript.push(Message::user(text));
                    self.observer.steered(round, text);
                }
            }
        }

        if cancelled {
            log::warn!("Simulation cancelled after {} responses", responses.len());
        } else {
            log::info!(
                "Simulation finished: {} responses, transcript length {}",
                responses.len(),
                transcript.len()
            );
        }

        Outcome {
            responses,
            transcript,
            cancelled,
        }
    }
}
