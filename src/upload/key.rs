//! Object key generation

use rand::distr::Alphanumeric;
use rand::Rng;

/// Length of the random token prepended to filenames
pub const TOKEN_LENGTH: usize = 16;

/// Random alphanumeric token
pub fn random_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Object key for a new upload: `<token>-<filename>`
pub fn generate_key(filename: &str) -> String {
    format!("{}-{}", random_token(), filename)
}
