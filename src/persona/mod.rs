//! Personas taking part in a simulated discussion
//!
//! A persona is a named identity whose backstory becomes the system message
//! of every request it makes. Personas hold no conversation state of their
//! own; each turn replays the whole shared transcript.

pub mod loader;

use std::rc::Rc;

use crate::completion::{Completion, Message};

pub use loader::{PersonaLoader, PersonaProfile};

/// A profile bound to the completion backend it speaks through
pub struct Persona {
    profile: PersonaProfile,
    client: Rc<dyn Completion>,
}

impl Persona {
    pub fn new(profile: PersonaProfile, client: Rc<dyn Completion>) -> Self {
        Self { profile, client }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// System backstory followed by the transcript, unfiltered.
    ///
    /// Earlier turns keep their generic `assistant` role no matter which
    /// persona produced them.
    pub fn request_messages(&self, transcript: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(self.profile.backstory.as_str()));
        messages.extend_from_slice(transcript);
        messages
    }

    /// One turn: whatever the backend returns, `None` meaning the persona passes
    pub fn respond(&self, transcript: &[Message], temperature: f32) -> Option<String> {
        let messages = self.request_messages(transcript);
        self.client.generate(&messages, temperature)
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Role;
    use std::cell::RefCell;

    /// Records every request and answers with a fixed reply
    struct Recorder {
        reply: Option<String>,
        seen: RefCell<Vec<(Vec<Message>, f32)>>,
    }

    impl Completion for Recorder {
        fn generate(&self, messages: &[Message], temperature: f32) -> Option<String> {
            self.seen.borrow_mut().push((messages.to_vec(), temperature));
            self.reply.clone()
        }
    }

    fn profile(name: &str) -> PersonaProfile {
        PersonaProfile {
            name: name.to_string(),
            goal: "Ship a clock".to_string(),
            backstory: format!("You are the {}.", name),
            model: None,
        }
    }

    #[test]
    fn test_request_messages_prepends_backstory() {
        let client = Rc::new(Recorder {
            reply: None,
            seen: RefCell::new(Vec::new()),
        });
        let persona = Persona::new(profile("Client"), client);
        let transcript = vec![
            Message::user("hello"),
            Message::assistant("from another persona"),
        ];

        let messages = persona.request_messages(&transcript);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::system("You are the Client."));
        assert_eq!(&messages[1..], transcript.as_slice());
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[test]
    fn test_respond_delegates_unchanged() {
        let client = Rc::new(Recorder {
            reply: Some("  spaced  ".to_string()),
            seen: RefCell::new(Vec::new()),
        });
        let persona = Persona::new(profile("Presenter"), client.clone());

        let reply = persona.respond(&[Message::user("hi")], 0.9);

        assert_eq!(reply.as_deref(), Some("  spaced  "));
        let seen = client.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.len(), 2);
        assert!((seen[0].1 - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_respond_passes_absence_through() {
        let client = Rc::new(Recorder {
            reply: None,
            seen: RefCell::new(Vec::new()),
        });
        let persona = Persona::new(profile("CAD Designer"), client);
        assert_eq!(persona.respond(&[Message::user("hi")], 0.5), None);
    }

    #[test]
    fn test_display() {
        let client = Rc::new(Recorder {
            reply: None,
            seen: RefCell::new(Vec::new()),
        });
        let persona = Persona::new(profile("Client"), client);
        assert_eq!(persona.to_string(), "Client: Ship a clock");
        assert_eq!(persona.name(), "Client");
    }
}
