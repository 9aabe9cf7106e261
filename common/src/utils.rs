// common/src/utils.rs
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Length of a session secret in hex characters.
pub const SESSION_SECRET_LEN: usize = 64;

/// Setup tracing for consistent logging.
pub fn setup_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Generate a cryptographically secure random token of specified length.
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a fresh session secret: 64 lowercase hex characters.
///
/// Random input is hashed so the stored value carries no structure.
pub fn generate_session_secret() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let random_part = generate_secure_token(32);

    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", timestamp, random_part).as_bytes());
    hex::encode(hasher.finalize())
}
