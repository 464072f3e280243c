//! Multipart boundary generation.

use crate::error::{Error, Result};
use chrono::Utc;
use rand::Rng;

/// Number of candidates tried before giving up on finding a free boundary.
pub const MAX_ATTEMPTS: usize = 16;

/// Generates a boundary candidate from the clock and the given RNG.
///
/// The `=_` prefix cannot occur in Base64 text, so encoded parts never
/// contain it in practice; [`choose`] still checks.
#[must_use]
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let stamp = Utc::now().timestamp_millis();
    format!("=_Part_{stamp:x}_{:016x}", rng.r#gen::<u64>())
}

/// Picks the first candidate from `next` that occurs in none of `parts`.
///
/// # Errors
///
/// Returns [`Error::BoundaryCollision`] if every candidate collides.
pub fn choose<P, F>(parts: &[P], mut next: F) -> Result<String>
where
    P: AsRef<str>,
    F: FnMut() -> String,
{
    for _ in 0..MAX_ATTEMPTS {
        let candidate = next();
        if parts.iter().all(|part| !part.as_ref().contains(&candidate)) {
            return Ok(candidate);
        }
    }

    Err(Error::BoundaryCollision(MAX_ATTEMPTS))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_generate_shape() {
        let boundary = generate(&mut StepRng::new(0xabc, 1));
        assert!(boundary.starts_with("=_Part_"));
        assert!(boundary.ends_with("_0000000000000abc"));
        assert!(boundary.len() <= 70);
    }

    #[test]
    fn test_choose_skips_colliding_candidate() {
        let mut candidates = vec!["second".to_string(), "first".to_string()];
        let parts = ["contains first here"];

        let boundary = choose(&parts, || candidates.pop().unwrap()).unwrap();
        assert_eq!(boundary, "second");
    }

    #[test]
    fn test_choose_gives_up() {
        let parts = ["xxxx"];
        let result = choose(&parts, || "xx".to_string());
        assert!(matches!(result, Err(Error::BoundaryCollision(MAX_ATTEMPTS))));
    }

    #[test]
    fn test_choose_without_parts() {
        let parts: [&str; 0] = [];
        assert_eq!(choose(&parts, || "b".to_string()).unwrap(), "b");
    }
}
