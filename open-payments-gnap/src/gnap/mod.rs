//! GNAP client-side signing for Open Payments.
//!
//! Every Open Payments API call is authenticated with an
//! [RFC 9421 HTTP Message Signature](https://www.rfc-editor.org/rfc/rfc9421.html)
//! made with the client's Ed25519 key. The key is published as a JWK under
//! the client's wallet address so that authorization and resource servers can
//! verify it.
//!
//! # Protocol Overview
//!
//! A signed request carries:
//!
//! - **Content-Digest**: `sha-512=:<base64>:` over the body, when there is one
//! - **Signature-Input**: `sig1=(<components>);alg="ed25519";keyid="<kid>";created=<unix>`
//! - **Signature**: `sig1=:<base64>:`
//!
//! The signature is computed over the SHA-512 digest of the signature base,
//! not over the base itself.
//!
//! # Key Components
//!
//! - [`keys`]: key generation, PKCS#8 PEM loading, JWK export
//! - [`signature_base`]: covered components and canonical base text
//! - [`signer`]: hash-then-sign and header rendering
//! - [`digest`]: `Content-Digest` computation
//! - [`request`]: [`RequestSigner`] facade producing the full header set
//! - [`verifier`]: [`SignatureVerifier`] for received requests
//! - [`hash`]: interaction hash check after user redirect
//!
//! # Examples
//!
//! ```rust
//! use open_payments_gnap::gnap::{
//!     RequestSigner, SignatureVerifier, generate_key_pair, request::default_headers,
//! };
//!
//! # fn example() -> open_payments_gnap::Result<()> {
//! let key_pair = generate_key_pair()?;
//! let signer = RequestSigner::new(key_pair.signing_key()?, key_pair.key_id());
//!
//! let body = br#"{"walletAddress":"https://wallet.example/alice"}"#;
//! let target = "https://rs.example.com/incoming-payments";
//! let signed = signer.prepare("POST", target, &default_headers(), Some(body))?;
//!
//! let verifier = SignatureVerifier::from_jwk(&key_pair.jwks.keys[0])?;
//! verifier.verify_request("POST", target, &signed.headers, Some(body))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Interaction Hash
//!
//! After the user approves a grant at the authorization server, the client
//! is redirected back with a `hash` query parameter. Check it with
//! [`verify_interaction_hash`] before continuing the grant:
//!
//! ```text
//! hash = base64(SHA-256("<client nonce>\n<interact nonce>\n<interact ref>\n<grant endpoint url>/"))
//! ```

pub mod digest;
pub mod hash;
pub mod keys;
pub mod request;
pub mod signature_base;
pub mod signer;
pub mod verifier;


pub use digest::compute_content_digest;
pub use hash::{compute_interaction_hash, verify_interaction_hash};
pub use keys::{Jwk, Jwks, KeyPair, generate_key_pair, load_private_key_from_pem};
pub use request::{Clock, FixedClock, RequestSigner, SignedHeaders, SystemClock};
pub use signature_base::{CoveragePolicy, CoveredComponent, SignatureBaseBuilder, SignatureParams};
pub use signer::{SignatureHeaders, signature_headers};
pub use verifier::SignatureVerifier;
