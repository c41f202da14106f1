//! Request signing facade used by Open Payments API calls.
//!
//! [`RequestSigner`] holds a loaded signing key and its key id and turns an
//! outgoing request (method, target URI, headers, optional body) into the
//! complete header set to send: the caller's headers plus `Content-Digest`,
//! `Signature-Input` and `Signature`.
//!
//! The signer holds no mutable state. Share one instance by reference (or
//! `Arc`) across every API client and thread.
//!
//! # Examples
//!
//! ```
//! use ed25519_dalek::SigningKey;
//! use open_payments_gnap::gnap::request::{RequestSigner, default_headers, gnap_authorization};
//! use reqwest::header::AUTHORIZATION;
//!
//! # fn example() -> open_payments_gnap::Result<()> {
//! let signer = RequestSigner::new(SigningKey::from_bytes(&[0u8; 32]), "my-key");
//!
//! let mut headers = default_headers();
//! headers.insert(AUTHORIZATION, gnap_authorization("access-token")?);
//!
//! let body = br#"{"walletAddress":"https://wallet.example/alice"}"#;
//! let signed = signer.prepare(
//!     "POST",
//!     "https://rs.example.com/incoming-payments",
//!     &headers,
//!     Some(body),
//! )?;
//!
//! assert!(signed.headers.contains_key("content-digest"));
//! assert!(signed.signature_input.starts_with("sig1=(\"content-type\" \"content-digest\""));
//! # Ok(())
//! # }
//! ```

use std::{fmt, sync::Arc, time::SystemTime};

use ed25519_dalek::{SigningKey, VerifyingKey};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use crate::{
    error::{GnapError, Result},
    gnap::{
        digest::compute_content_digest,
        keys::Jwk,
        signature_base::{CoveragePolicy, SignatureBaseBuilder},
        signer::signature_headers,
        verifier::{CONTENT_DIGEST_HEADER, SIGNATURE_HEADER, SIGNATURE_INPUT_HEADER},
    },
};

/// Source of the `created` signature parameter.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current time in Unix seconds.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::ClockError`] if the time cannot be determined.
    fn now_unix(&self) -> Result<u64>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> Result<u64> {
        Ok(SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|e| GnapError::ClockError(e.to_string()))?
            .as_secs())
    }
}

/// A clock frozen at the given Unix time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_unix(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// Complete header set: the caller's headers plus the signature headers.
    pub headers: HeaderMap,
    /// `Content-Digest` value, when a body was supplied.
    pub content_digest: Option<String>,
    /// `Signature-Input` value.
    pub signature_input: String,
    /// `Signature` value.
    pub signature: String,
}

/// Signs outgoing requests with one client key.
#[derive(Debug, Clone)]
pub struct RequestSigner<C = SystemClock> {
    signing_key: SigningKey,
    key_id: Arc<str>,
    clock: C,
}

impl RequestSigner<SystemClock> {
    /// Creates a signer that timestamps signatures with the system clock.
    #[must_use]
    pub fn new(signing_key: SigningKey, key_id: &str) -> Self {
        Self::with_clock(signing_key, key_id, SystemClock)
    }
}

impl<C: Clock> RequestSigner<C> {
    /// Creates a signer with an explicit clock.
    #[must_use]
    pub fn with_clock(signing_key: SigningKey, key_id: &str, clock: C) -> Self {
        Self { signing_key, key_id: Arc::from(key_id), clock }
    }

    /// Key id placed in `keyid`.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Public half of the signing key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key as a JWK carrying this signer's key id.
    #[must_use]
    pub fn jwk(&self) -> Jwk {
        Jwk::from_verifying_key(&*self.key_id, &self.verifying_key())
    }

    /// Signs a request using [`CoveragePolicy::Default`].
    ///
    /// When `body` is `Some`, its `Content-Digest` is computed (also for an
    /// empty body), merged into the headers and covered by the signature.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`prepare_with_policy`](Self::prepare_with_policy).
    pub fn prepare(
        &self,
        method: &str,
        target_uri: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<SignedHeaders> {
        self.prepare_with_policy(method, target_uri, headers, body, &CoveragePolicy::Default)
    }

    /// Signs a request covering the components selected by `policy`.
    ///
    /// # Errors
    ///
    /// - [`GnapError::MissingComponent`] if an explicitly covered header is absent
    /// - [`GnapError::EncodingFailure`] if a covered value is not visible ASCII
    /// - [`GnapError::InvalidTargetUri`] if the target URI is not absolute
    /// - [`GnapError::ClockError`] if the clock cannot be read
    #[instrument(
        skip(self, headers, body, policy),
        fields(key_id = %self.key_id, body_len = body.map_or(0, <[u8]>::len))
    )]
    pub fn prepare_with_policy(
        &self,
        method: &str,
        target_uri: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
        policy: &CoveragePolicy,
    ) -> Result<SignedHeaders> {
        let mut headers = headers.clone();

        let content_digest = body.map(compute_content_digest);
        if let Some(digest) = &content_digest {
            headers.insert(CONTENT_DIGEST_HEADER, to_header_value(digest)?);
        }

        let created = self.clock.now_unix()?;
        let base = SignatureBaseBuilder::new(method, target_uri, &headers)
            .with_policy(policy.clone())
            .build(&self.key_id, created)?;
        let signed = signature_headers(&base, &self.signing_key);

        headers.insert(SIGNATURE_INPUT_HEADER, to_header_value(&signed.signature_input)?);
        headers.insert(SIGNATURE_HEADER, to_header_value(&signed.signature)?);

        debug!(components = base.params().components().len(), created, "signed request");

        Ok(SignedHeaders {
            headers,
            content_digest,
            signature_input: signed.signature_input,
            signature: signed.signature,
        })
    }

    /// Signs a built `reqwest` request in place.
    ///
    /// An empty body is treated as no body. For a non-empty body a
    /// `content-length` header is added when missing so that it is covered.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::EncodingFailure`] for streaming bodies, plus the
    /// errors of [`prepare`](Self::prepare).
    pub fn sign_reqwest_request(&self, request: &mut reqwest::Request) -> Result<()> {
        let body = match request.body() {
            None => None,
            Some(body) => {
                let bytes = body.as_bytes().ok_or_else(|| {
                    GnapError::EncodingFailure("streaming request bodies cannot be signed".to_owned())
                })?;
                (!bytes.is_empty()).then(|| bytes.to_vec())
            }
        };

        if let Some(bytes) = &body {
            if !request.headers().contains_key(CONTENT_LENGTH) {
                request.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            }
        }

        let signed = self.prepare(
            request.method().as_str(),
            request.url().as_str(),
            request.headers(),
            body.as_deref(),
        )?;
        *request.headers_mut() = signed.headers;
        Ok(())
    }
}

/// Builds the `Authorization: GNAP <token>` header value.
///
/// # Errors
///
/// Returns [`GnapError::EncodingFailure`] if the token is not a valid header value.
pub fn gnap_authorization(access_token: &str) -> Result<HeaderValue> {
    to_header_value(&format!("GNAP {access_token}"))
}

/// Headers sent with every JSON request body.
#[must_use]
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Returns `true` if the header map carries a GNAP access token.
#[must_use]
pub fn has_gnap_authorization(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("GNAP "))
}

fn to_header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GnapError::EncodingFailure(format!("invalid header value: {e}")))
}
