//! Passphrase gate
//!
//! Produces the single "authenticated" signal the engine waits for in
//! `password`. Comparison ignores case and surrounding whitespace.

/// Case-insensitive passphrase check
#[derive(Debug, Clone)]
pub struct PassphraseGate {
    passphrase: String,
}

impl PassphraseGate {
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.trim().to_lowercase(),
        }
    }

    pub fn verify(&self, input: &str) -> bool {
        !input.trim().is_empty() && input.trim().to_lowercase() == self.passphrase
    }
}
