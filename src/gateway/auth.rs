// src/gateway/auth.rs

use std::sync::Arc;

use tracing::warn;

/// bcrypt work factor for hashes produced by `--hash-password`.
pub const HASH_COST: u32 = 10;

/// Check `password` against a bcrypt hash off the async runtime.
pub async fn verify_password(password: String, hash: Arc<str>) -> bool {
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            warn!(error = %e, "stored password hash is unusable");
            false
        }
        Err(e) => {
            warn!(error = %e, "password verification task failed");
            false
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, HASH_COST)
}
