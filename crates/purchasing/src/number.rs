//! Order number generation.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

/// Produces `<prefix><year><6 uppercase alphanumerics>`, e.g. `PO2026X7Q2ZD`.
///
/// Numbers are unique with high probability only; the store's unique key is
/// the authority and callers retry on conflict.
#[derive(Debug)]
pub struct OrderNumberGenerator {
    prefix: String,
    seeded: Option<Mutex<StdRng>>,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            seeded: None,
        }
    }

    /// Deterministic sequence; two generators with the same seed collide.
    pub fn seeded(prefix: impl Into<String>, seed: u64) -> Self {
        Self {
            prefix: prefix.into(),
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> String {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{}{}{}", self.prefix, now.year(), suffix)
    }

    /// Generate from the seeded sequence, or the thread-local RNG.
    pub fn next(&self, now: DateTime<Utc>) -> String {
        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                self.generate(&mut *rng, now)
            }
            None => self.generate(&mut rand::thread_rng(), now),
        }
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("PO")
    }
}
