//! `Content-Digest` computation per RFC 9530.
//!
//! Open Payments binds request bodies into the signature through a SHA-512
//! `Content-Digest` header rendered as a structured-field byte sequence:
//!
//! ```text
//! Content-Digest: sha-512=:<base64(SHA-512(body))>:
//! ```

use sha2::{Digest, Sha512};

/// Digest algorithm token used in the header.
pub const CONTENT_DIGEST_ALGORITHM: &str = "sha-512";

/// Computes the `Content-Digest` header value for a request body.
///
/// An empty body still yields a digest (of zero bytes); whether to attach the
/// header to a bodiless request is up to the caller.
///
/// # Examples
///
/// ```
/// use open_payments_gnap::gnap::digest::compute_content_digest;
///
/// let digest = compute_content_digest(b"hello");
/// assert!(digest.starts_with("sha-512=:"));
/// assert!(digest.ends_with(':'));
/// ```
#[must_use]
pub fn compute_content_digest(body: &[u8]) -> String {
    let hash = Sha512::digest(body);
    let hash_b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, hash);
    format!("{CONTENT_DIGEST_ALGORITHM}=:{hash_b64}:")
}

/// Checks a received `Content-Digest` header value against a body.
///
/// Only the `sha-512` member is considered; other members of the dictionary
/// are ignored. Returns `false` when no `sha-512` member is present.
#[must_use]
pub fn verify_content_digest(header_value: &str, body: &[u8]) -> bool {
    let expected = compute_content_digest(body);
    header_value.split(',').map(str::trim).any(|member| member == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_digest() {
        let expected_hash = Sha512::digest(b"");
        let expected_b64 =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, expected_hash);
        assert_eq!(compute_content_digest(b""), format!("sha-512=:{expected_b64}:"));
    }

    #[test]
    fn test_known_value() {
        assert_eq!(
            compute_content_digest(b"hello"),
            "sha-512=:m3HSJL1i83hdltRq0+o9czGb+8KJDKra4t/3JRlnPKcjI8PZm6XBHXx6zG4UuMXaDEZjR1wuXDre9G9zvN7AQw==:"
        );
    }

    #[test]
    fn test_verify_content_digest() {
        let header = compute_content_digest(b"{\"amount\":\"100\"}");
        assert!(verify_content_digest(&header, b"{\"amount\":\"100\"}"));
        assert!(!verify_content_digest(&header, b"{\"amount\":\"101\"}"));
    }

    #[test]
    fn test_verify_content_digest_with_other_members() {
        let header = format!("sha-256=:abc=:, {}", compute_content_digest(b"body"));
        assert!(verify_content_digest(&header, b"body"));
        assert!(!verify_content_digest("sha-256=:abc=:", b"body"));
    }
}
