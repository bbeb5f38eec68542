pub mod random;

pub use random::RandomGenerator;

use tinylink_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is not guaranteed; the engine checks candidates against the
/// store and retries on collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Produces a candidate short code.
    fn generate(&self) -> Self::Output;
}
