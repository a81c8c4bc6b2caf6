//! Random credential generation.
//!
//! Callers supply the random source so tests can seed it.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Fixed first character of an initial root password, so every generated
/// password opens with a letter whatever the random tail draws.
pub const ROOT_PASSWORD_PREFIX: char = 'p';

/// Number of random characters following [`ROOT_PASSWORD_PREFIX`].
pub const ROOT_PASSWORD_RANDOM_LENGTH: usize = 63;

/// Returns `length` characters drawn uniformly from `A-Z`, `a-z` and `0-9`.
#[must_use]
pub fn generate<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Returns a 64 character password suitable for a server's first boot.
#[must_use]
pub fn initial_root_password<R: Rng>(rng: &mut R) -> String {
    let mut password = String::with_capacity(ROOT_PASSWORD_RANDOM_LENGTH + 1);
    password.push(ROOT_PASSWORD_PREFIX);
    password.push_str(&generate(rng, ROOT_PASSWORD_RANDOM_LENGTH));
    password
}
