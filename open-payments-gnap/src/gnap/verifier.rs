//! Verification of signed Open Payments requests.
//!
//! Mirrors what an authorization or resource server does on receipt: parse
//! `Signature-Input`, rebuild the signature base from the received request
//! using the declared components and the parameter string exactly as
//! received, check `Content-Digest` against the body, and verify the Ed25519
//! signature over the SHA-512 digest of the base.

use ed25519_dalek::{Signature, VerifyingKey};
use reqwest::header::HeaderMap;
use signature::Verifier;
use tracing::{debug, instrument, warn};

use crate::{
    error::{GnapError, Result},
    gnap::{
        digest::verify_content_digest,
        keys::Jwk,
        signature_base::{SIGNATURE_LABEL, SignatureBaseBuilder, SignatureParams},
        signer::hash_signature_base,
    },
};

/// Header carrying the signature parameters.
pub const SIGNATURE_INPUT_HEADER: &str = "signature-input";
/// Header carrying the signature bytes.
pub const SIGNATURE_HEADER: &str = "signature";
/// Header carrying the body digest.
pub const CONTENT_DIGEST_HEADER: &str = "content-digest";

/// Verifies request signatures made with one client key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key_id: String,
    verifying_key: VerifyingKey,
}

impl SignatureVerifier {
    /// Creates a verifier for the given key id and public key.
    #[must_use]
    pub fn new(key_id: &str, verifying_key: VerifyingKey) -> Self {
        Self { key_id: key_id.to_owned(), verifying_key }
    }

    /// Creates a verifier from a published JWK.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Jwk::to_verifying_key`].
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        Ok(Self::new(&jwk.kid, jwk.to_verifying_key()?))
    }

    /// Verifies a received request and returns its signature parameters.
    ///
    /// A non-empty body must be covered through `content-digest`, and the
    /// digest must match the body.
    ///
    /// # Errors
    ///
    /// - [`GnapError::SignatureError`] if the signature headers are missing or malformed
    /// - [`GnapError::MissingComponent`] if a declared header is absent
    /// - [`GnapError::VerificationFailed`] if the key id, digest or signature does not match
    #[instrument(skip(self, headers, body), fields(body_len = body.map_or(0, <[u8]>::len)))]
    pub fn verify_request(
        &self,
        method: &str,
        target_uri: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<SignatureParams> {
        let raw_params = labelled_member(headers, SIGNATURE_INPUT_HEADER)?;
        let params = SignatureParams::parse(raw_params)?;

        if params.key_id() != self.key_id {
            warn!(expected = %self.key_id, received = %params.key_id(), "unknown key id");
            return Err(GnapError::VerificationFailed);
        }

        let covers_digest = params
            .components()
            .iter()
            .any(|component| component.name() == CONTENT_DIGEST_HEADER);
        match body {
            Some(body) if covers_digest => {
                let digest = headers
                    .get(CONTENT_DIGEST_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| GnapError::MissingComponent(CONTENT_DIGEST_HEADER.to_owned()))?;
                if !verify_content_digest(digest, body) {
                    debug!("content digest does not match body");
                    return Err(GnapError::VerificationFailed);
                }
            }
            Some(body) if !body.is_empty() => {
                debug!("body present but content-digest not covered");
                return Err(GnapError::VerificationFailed);
            }
            _ => {}
        }

        let signature = decode_signature(labelled_member(headers, SIGNATURE_HEADER)?)?;
        let base = SignatureBaseBuilder::new(method, target_uri, headers)
            .rebuild(params.components(), raw_params)?;

        self.verifying_key
            .verify(&hash_signature_base(&base), &signature)
            .map_err(|_| {
                debug!("signature does not verify");
                GnapError::VerificationFailed
            })?;

        Ok(params)
    }
}

/// Returns the `sig1` member of a signature header.
fn labelled_member<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str> {
    let value = headers
        .get(name)
        .ok_or_else(|| GnapError::SignatureError(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| GnapError::SignatureError(format!("{name} header is not ASCII")))?;

    value
        .trim()
        .strip_prefix(SIGNATURE_LABEL)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or_else(|| {
            GnapError::SignatureError(format!("{name} header has no {SIGNATURE_LABEL} member"))
        })
}

fn decode_signature(member: &str) -> Result<Signature> {
    let sig_b64 = member
        .strip_prefix(':')
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or_else(|| GnapError::SignatureError("signature is not a byte sequence".to_owned()))?;

    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, sig_b64)
        .map_err(|e| GnapError::SignatureError(format!("signature base64: {e}")))?;
    let bytes: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
        GnapError::SignatureError(format!("signature is {} bytes, expected 64", b.len()))
    })?;

    Ok(Signature::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

    use super::*;
    use crate::gnap::request::{FixedClock, RequestSigner};

    const TARGET: &str = "https://rs.example.com/incoming-payments";

    fn signer() -> RequestSigner<FixedClock> {
        RequestSigner::with_clock(SigningKey::from_bytes(&[11u8; 32]), "key-11", FixedClock(1_700_000_000))
    }

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("key-11", SigningKey::from_bytes(&[11u8; 32]).verifying_key())
    }

    fn request_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("GNAP abc"));
        headers
    }

    #[test]
    fn test_verify_signed_post() {
        let body = br#"{"walletAddress":"https://wallet.example/alice"}"#;
        let signed = signer().prepare("POST", TARGET, &request_headers(), Some(body)).unwrap();

        let params = verifier().verify_request("POST", TARGET, &signed.headers, Some(body)).unwrap();
        assert_eq!(params.key_id(), "key-11");
        assert_eq!(params.created(), 1_700_000_000);
    }

    #[test]
    fn test_verify_signed_get() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        assert!(verifier().verify_request("GET", TARGET, &signed.headers, None).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signed = signer().prepare("POST", TARGET, &request_headers(), Some(b"{}")).unwrap();
        let err = verifier()
            .verify_request("POST", TARGET, &signed.headers, Some(b"{\"x\":1}"))
            .unwrap_err();
        assert!(matches!(err, GnapError::VerificationFailed));
    }

    #[test]
    fn test_tampered_header_rejected() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        let mut headers = signed.headers;
        headers.insert(AUTHORIZATION, HeaderValue::from_static("GNAP abd"));

        let err = verifier().verify_request("GET", TARGET, &headers, None).unwrap_err();
        assert!(matches!(err, GnapError::VerificationFailed));
    }

    #[test]
    fn test_other_target_rejected() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        let err = verifier()
            .verify_request("GET", "https://rs.example.com/outgoing-payments", &signed.headers, None)
            .unwrap_err();
        assert!(matches!(err, GnapError::VerificationFailed));
    }

    #[test]
    fn test_trailing_slash_normalized_on_both_sides() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        let with_slash = format!("{TARGET}/");
        assert!(verifier().verify_request("GET", &with_slash, &signed.headers, None).is_ok());
    }

    #[test]
    fn test_wrong_key_id_rejected() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        let other = SignatureVerifier::new("key-12", SigningKey::from_bytes(&[11u8; 32]).verifying_key());
        assert!(matches!(
            other.verify_request("GET", TARGET, &signed.headers, None),
            Err(GnapError::VerificationFailed)
        ));
    }

    #[test]
    fn test_uncovered_body_rejected() {
        let signed = signer().prepare("POST", TARGET, &request_headers(), None).unwrap();
        assert!(matches!(
            verifier().verify_request("POST", TARGET, &signed.headers, Some(b"smuggled")),
            Err(GnapError::VerificationFailed)
        ));
    }

    #[test]
    fn test_key_id_with_separators_round_trips() {
        for key_id in ["tenant;k1", "a=b", "k (1), v2"] {
            let signing_key = SigningKey::from_bytes(&[11u8; 32]);
            let verifier = SignatureVerifier::new(key_id, signing_key.verifying_key());
            let signer = RequestSigner::with_clock(signing_key, key_id, FixedClock(1));

            let signed = signer.prepare("GET", TARGET, &request_headers(), None).unwrap();
            let params = verifier
                .verify_request("GET", TARGET, &signed.headers, None)
                .unwrap_or_else(|e| panic!("key id `{key_id}` did not verify: {e}"));
            assert_eq!(params.key_id(), key_id);
        }
    }

    #[test]
    fn test_missing_signature_headers() {
        let err = verifier().verify_request("GET", TARGET, &request_headers(), None).unwrap_err();
        assert!(matches!(err, GnapError::SignatureError(_)));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        let mut headers = signed.headers;
        headers.insert("signature", HeaderValue::from_static("sig1=:AAAA:"));

        let err = verifier().verify_request("GET", TARGET, &headers, None).unwrap_err();
        assert!(matches!(err, GnapError::SignatureError(_)));
    }

    #[test]
    fn test_from_jwk() {
        let signing_key = SigningKey::from_bytes(&[11u8; 32]);
        let jwk = Jwk::from_verifying_key("key-11", &signing_key.verifying_key());
        let verifier = SignatureVerifier::from_jwk(&jwk).unwrap();

        let signed = signer().prepare("GET", TARGET, &request_headers(), None).unwrap();
        assert!(verifier.verify_request("GET", TARGET, &signed.headers, None).is_ok());
    }
}
