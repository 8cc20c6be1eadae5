//! Masked operator entry with confirmation.

use std::io;

use super::Backend;
use crate::error::{CredentialError, Result};
use crate::prompt::{SecretPrompt, TerminalPrompt};
use crate::secret::Secret;
use crate::strength;
use crate::types::{SecretKind, SecretSource};

/// Backend that asks the operator for each missing secret
pub struct InteractiveBackend {
    prompt: Box<dyn SecretPrompt>,
    min_score: u8,
}

impl InteractiveBackend {
    pub fn new(min_score: u8) -> Self {
        Self::with_prompt(Box::new(TerminalPrompt::new()), min_score)
    }

    pub fn with_prompt(prompt: Box<dyn SecretPrompt>, min_score: u8) -> Self {
        Self { prompt, min_score }
    }

    fn read(&mut self, kind: SecretKind, label: &str) -> Result<zeroize::Zeroizing<String>> {
        self.prompt.read_secret(label).map_err(|e| match e.kind() {
            io::ErrorKind::Interrupted => CredentialError::Aborted { kind },
            _ => CredentialError::Io(e),
        })
    }

    /// Prompt until the operator enters an acceptable, confirmed value
    fn ask(&mut self, kind: SecretKind) -> Result<Secret> {
        let label = format!("Enter {}", kind.description());
        let confirm_label = format!("Confirm {}", kind.description());

        loop {
            let value = self.read(kind, &label)?;

            if let Err(e) = strength::validate_for(&value, kind) {
                self.prompt.notice(&e.to_string());
                continue;
            }
            let score = strength::score(&value);
            if score < self.min_score {
                self.prompt.notice(&format!(
                    "Too weak (score {}/{}, need {}). Mix upper and lower case, digits and symbols.",
                    score,
                    strength::MAX_SCORE,
                    self.min_score
                ));
                continue;
            }

            let confirmation = self.read(kind, &confirm_label)?;
            if *confirmation != *value {
                self.prompt.notice("Entries do not match, try again.");
                continue;
            }

            return Secret::new(kind, value, SecretSource::Interactive);
        }
    }
}

impl Backend for InteractiveBackend {
    fn name(&self) -> &'static str {
        "interactive"
    }

    fn source(&self) -> SecretSource {
        SecretSource::Interactive
    }

    fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>> {
        if !self.prompt.is_available() {
            return Err(CredentialError::unavailable(
                "interactive",
                "stdin is not a terminal",
            ));
        }

        let mut secrets = Vec::with_capacity(wanted.len());
        for &kind in wanted {
            secrets.push(self.ask(kind)?);
            tracing::debug!(%kind, "Secret entered interactively");
        }
        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use zeroize::Zeroizing;

    /// Replays canned answers; running out counts as an abort
    struct ScriptedPrompt {
        answers: VecDeque<&'static str>,
        notices: Rc<RefCell<Vec<String>>>,
        available: bool,
    }

    impl ScriptedPrompt {
        fn new(answers: &[&'static str]) -> (Self, Rc<RefCell<Vec<String>>>) {
            let notices = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    answers: answers.iter().copied().collect(),
                    notices: Rc::clone(&notices),
                    available: true,
                },
                notices,
            )
        }
    }

    impl SecretPrompt for ScriptedPrompt {
        fn is_available(&self) -> bool {
            self.available
        }
        fn read_secret(&mut self, _prompt: &str) -> io::Result<Zeroizing<String>> {
            self.answers
                .pop_front()
                .map(|a| Zeroizing::new(a.to_string()))
                .ok_or_else(|| io::Error::new(io::ErrorKind::Interrupted, "script exhausted"))
        }
        fn notice(&mut self, message: &str) {
            self.notices.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn test_accepts_confirmed_entry() {
        let (prompt, notices) = ScriptedPrompt::new(&["Str0ng!Pass", "Str0ng!Pass"]);
        let mut backend = InteractiveBackend::with_prompt(Box::new(prompt), 3);
        let secrets = backend.try_resolve(&[SecretKind::Root]).unwrap();
        assert_eq!(secrets[0].expose(), "Str0ng!Pass");
        assert_eq!(secrets[0].source(), SecretSource::Interactive);
        assert!(notices.borrow().is_empty());
    }

    #[test]
    fn test_loops_on_weak_denied_and_mismatched_entries() {
        let (prompt, notices) = ScriptedPrompt::new(&[
            "password",      // deny-listed
            "abcdefgh",      // valid length, score 2
            "Str0ng!Pass",   // good
            "Str0ng!Pa55",   // mismatch
            "Str0ng!Pass",
            "Str0ng!Pass",
        ]);
        let mut backend = InteractiveBackend::with_prompt(Box::new(prompt), 3);
        let secrets = backend.try_resolve(&[SecretKind::User]).unwrap();
        assert_eq!(secrets.len(), 1);

        let notices = notices.borrow();
        assert_eq!(notices.len(), 3);
        assert!(notices[2].contains("do not match"));
        // Rejection messages never repeat what was typed
        assert!(notices.iter().all(|n| !n.contains("abcdefgh") && !n.contains("Str0ng")));
    }

    #[test]
    fn test_abort_is_fatal() {
        let (prompt, _) = ScriptedPrompt::new(&["Str0ng!Pass", "Str0ng!Pass"]);
        let mut backend = InteractiveBackend::with_prompt(Box::new(prompt), 3);
        let err = backend
            .try_resolve(&[SecretKind::User, SecretKind::Root])
            .unwrap_err();
        assert!(matches!(err, CredentialError::Aborted { kind: SecretKind::Root }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unavailable_without_terminal() {
        let (mut prompt, _) = ScriptedPrompt::new(&[]);
        prompt.available = false;
        let mut backend = InteractiveBackend::with_prompt(Box::new(prompt), 3);
        assert!(matches!(
            backend.try_resolve(&[SecretKind::User]),
            Err(CredentialError::BackendUnavailable { backend: "interactive", .. })
        ));
    }
}
