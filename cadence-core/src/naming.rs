//! Friendly-name generators
//!
//! Items registered without a name get one from the generator injected
//! into the registry or engine. The default draws a random suffix below
//! 500 after the item's kind (`DigitalPin137`); tests use [`Sequential`].

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

use crate::item::{compose_label, Label};

/// Upper bound (exclusive) of random name suffixes
pub const RANDOM_SUFFIX_LIMIT: u64 = 500;

/// Source of generated friendly names
pub trait NameGenerator: Send {
    /// Generate a name for an item of the given kind
    fn generate(&mut self, kind: &str) -> Label;
}

/// Kind followed by a random number in `0..500`
#[derive(Debug, Clone, Default)]
pub struct RandomSuffix {
    seed: RandomState,
    draws: u64,
}

impl RandomSuffix {
    /// Create a generator with a fresh random seed
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameGenerator for RandomSuffix {
    fn generate(&mut self, kind: &str) -> Label {
        self.draws = self.draws.wrapping_add(1);
        let suffix = self.seed.hash_one(self.draws) % RANDOM_SUFFIX_LIMIT;
        compose_label(kind, suffix as u32)
    }
}

/// Kind followed by a per-generator counter (`Key0`, `Key1`, ...)
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    next: u32,
}

impl Sequential {
    /// Create a generator starting at zero
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameGenerator for Sequential {
    fn generate(&mut self, kind: &str) -> Label {
        let label = compose_label(kind, self.next);
        self.next = self.next.wrapping_add(1);
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_suffix_range() {
        let mut names = RandomSuffix::new();
        for _ in 0..100 {
            let name = names.generate("DigitalPin");
            let suffix: u64 = name.trim_start_matches("DigitalPin").parse().unwrap();
            assert!(suffix < RANDOM_SUFFIX_LIMIT);
        }
    }

    #[test]
    fn test_sequential_names() {
        let mut names = Sequential::new();
        assert_eq!(names.generate("Key").as_str(), "Key0");
        assert_eq!(names.generate("Key").as_str(), "Key1");
        assert_eq!(names.generate("PwmPin").as_str(), "PwmPin2");
    }
}
