//! Short identifier generation for pastes.
//!
//! Candidates are sampled from a cryptographically strong RNG; predictable
//! identifiers would let callers enumerate other users' pastes. Uniqueness
//! is enforced by the store at insert time, not here; the generator only
//! proposes candidates.

use rand::Rng;
use regex::Regex;

/// Number of insert attempts before a create fails with
/// `AllocationExhausted`. Guards against alphabet/length misconfiguration
/// as much as against a saturated id space.
pub const MAX_ID_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct IdGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl IdGenerator {
    /// The alphabet must hold at least 2 distinct characters; config
    /// validation enforces this before a generator is built.
    pub fn new(alphabet: &str, length: usize) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            length,
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| self.alphabet[rng.random_range(0..self.alphabet.len())])
            .collect()
    }

    /// Anchored pattern matching exactly the identifiers this generator
    /// can produce; used to pre-screen path parameters before touching
    /// the store.
    pub fn id_pattern(&self) -> Regex {
        let class: String = self
            .alphabet
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        Regex::new(&format!("^[{}]{{{}}}$", class, self.length))
            .expect("identifier pattern built from validated alphabet")
    }
}
