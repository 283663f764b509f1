use hmac::{Hmac, Mac};
use sha2::Sha256;

// HMAC-SHA256(user_id, login_secret) → token_hash (lowercase hex)

type HmacSha256 = Hmac<Sha256>;

/// Derive the `token_hash` proof for `user_id` from the shared secret.
pub fn compute_token_hash(secret: &str, user_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(user_id.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}
