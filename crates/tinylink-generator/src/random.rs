use crate::Generator;
use rand::Rng;
use tinylink_core::shortcode::{ALPHABET, CODE_LENGTH};
use tinylink_core::ShortCode;

/// Draws codes uniformly at random from the 62-character alphabet.
///
/// Uses the thread-local generator, which is a cryptographically secure
/// PRNG seeded from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates a code using the supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> ShortCode {
        let code: String = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        Self::generate_with(&mut rand::rng())
    }
}
