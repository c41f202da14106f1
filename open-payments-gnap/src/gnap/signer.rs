//! Hash-then-sign engine producing `Signature-Input` and `Signature` values.
//!
//! Open Payments signs the SHA-512 digest of the signature base rather than
//! the base itself. Ed25519 would normally hash the message internally; the
//! extra stage is part of the wire protocol and servers verify against the
//! 64-byte digest.

use ed25519_dalek::{Signature, SigningKey};
use sha2::{Digest, Sha512};
use signature::Signer;

use crate::gnap::signature_base::{SIGNATURE_LABEL, SignatureBase};

/// Header values carrying a request signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// `Signature-Input` header value (`sig1=(...);alg=...;keyid=...;created=...`).
    pub signature_input: String,
    /// `Signature` header value (`sig1=:<base64>:`).
    pub signature: String,
}

/// SHA-512 digest of the UTF-8 signature base.
#[must_use]
pub fn hash_signature_base(base: &str) -> [u8; 64] {
    let mut hash = [0u8; 64];
    hash.copy_from_slice(&Sha512::digest(base.as_bytes()));
    hash
}

/// Raw Ed25519 signature over a signature-base digest.
#[must_use]
pub fn sign_hash(hash: &[u8], signing_key: &SigningKey) -> Signature {
    signing_key.sign(hash)
}

/// Hashes and signs a signature base, returning the header values to attach.
///
/// # Examples
///
/// ```
/// use ed25519_dalek::SigningKey;
/// use open_payments_gnap::gnap::{signature_base::SignatureBaseBuilder, signer::signature_headers};
/// use reqwest::header::HeaderMap;
///
/// # fn example() -> open_payments_gnap::Result<()> {
/// let signing_key = SigningKey::from_bytes(&[0u8; 32]);
/// let headers = HeaderMap::new();
/// let base = SignatureBaseBuilder::new("GET", "https://rs.example.com/quotes/1", &headers)
///     .build("my-key", 1_700_000_000)?;
///
/// let signed = signature_headers(&base, &signing_key);
/// assert_eq!(
///     signed.signature_input,
///     "sig1=(\"@method\" \"@target-uri\");alg=\"ed25519\";keyid=\"my-key\";created=1700000000"
/// );
/// assert!(signed.signature.starts_with("sig1=:"));
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn signature_headers(base: &SignatureBase, signing_key: &SigningKey) -> SignatureHeaders {
    let hash = hash_signature_base(base.as_str());
    let signature = sign_hash(&hash, signing_key);
    let signature_b64 =
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, signature.to_bytes());

    SignatureHeaders {
        signature_input: format!("{SIGNATURE_LABEL}={}", base.params()),
        signature: format!("{SIGNATURE_LABEL}=:{signature_b64}:"),
    }
}
