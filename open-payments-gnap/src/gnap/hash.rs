//! GNAP interaction hash verification.
//!
//! When an interactive grant finishes, the authorization server redirects the
//! user back to the client with `interact_ref` and `hash` query parameters.
//! The client recomputes the hash from the nonces it exchanged with the
//! server and rejects the redirect unless both values match.
//!
//! ```text
//! hash = base64(SHA-256(client_nonce "\n" interact_nonce "\n" interact_ref "\n" auth_server_url "/"))
//! ```
//!
//! The authorization server URL is always followed by a `/`, even if it
//! already ends with one.

use sha2::{Digest, Sha256};
use tracing::debug;

/// Computes the interaction hash for a grant redirect.
///
/// # Examples
///
/// ```
/// use open_payments_gnap::gnap::hash::compute_interaction_hash;
///
/// let hash = compute_interaction_hash("abc123", "xyz456", "ref789", "https://auth.example.com");
/// assert_eq!(hash.len(), 44);
/// ```
#[must_use]
pub fn compute_interaction_hash(
    client_nonce: &str,
    interact_nonce: &str,
    interact_ref: &str,
    auth_server_url: &str,
) -> String {
    let hash = interaction_digest(client_nonce, interact_nonce, interact_ref, auth_server_url);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, hash)
}

fn interaction_digest(
    client_nonce: &str,
    interact_nonce: &str,
    interact_ref: &str,
    auth_server_url: &str,
) -> [u8; 32] {
    let data = format!("{client_nonce}\n{interact_nonce}\n{interact_ref}\n{auth_server_url}/");
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(data.as_bytes()));
    hash
}

/// Verifies the `hash` received on a grant redirect.
///
/// Returns `false` on any mismatch; the caller decides how to reject the
/// redirect.
///
/// # Examples
///
/// ```
/// use open_payments_gnap::gnap::hash::{compute_interaction_hash, verify_interaction_hash};
///
/// let url = "https://auth.example.com";
/// let received = compute_interaction_hash("abc123", "xyz456", "ref789", url);
///
/// assert!(verify_interaction_hash("abc123", "xyz456", "ref789", url, &received));
/// assert!(!verify_interaction_hash("abc123", "xyz456", "ref789", url, "wrong-hash"));
/// ```
#[must_use]
pub fn verify_interaction_hash(
    client_nonce: &str,
    interact_nonce: &str,
    interact_ref: &str,
    auth_server_url: &str,
    received_hash: &str,
) -> bool {
    let computed = interaction_digest(client_nonce, interact_nonce, interact_ref, auth_server_url);
    let valid = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, received_hash)
        .is_ok_and(|received| constant_time_eq(&computed, &received));
    if !valid {
        debug!(interact_ref, "interaction hash mismatch");
    }
    valid
}

/// Constant-time comparison of a digest against received bytes.
fn constant_time_eq(expected: &[u8; 32], received: &[u8]) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    expected.iter().zip(received).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}
