//! Subcommand implementations.
//!
//! Each command returns `Ok(true)` on success, `Ok(false)` for a negative
//! verification result and `Err` for usage or I/O problems.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use open_payments_gnap::{
    ClientConfig,
    gnap::{
        Jwks, SignatureParams, SignatureVerifier, generate_key_pair,
        request::{default_headers, gnap_authorization},
        signature_base::SIGNATURE_LABEL,
        verify_interaction_hash,
    },
};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use tracing::{info, warn};

/// Request description shared by `sign` and `verify`.
pub struct RequestArgs<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a [String],
    pub body: Option<&'a str>,
}

pub fn keygen(out_dir: Option<&Path>) -> Result<bool> {
    let key_pair = generate_key_pair()?;
    let jwks_json = key_pair.jwks.to_json()?;

    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let key_path = dir.join("private.pem");
        fs::write(&key_path, &key_pair.private_key_pem)
            .with_context(|| format!("writing {}", key_path.display()))?;
        fs::write(dir.join("jwks.json"), &jwks_json)
            .with_context(|| format!("writing {}", dir.join("jwks.json").display()))?;
        info!(key_id = %key_pair.key_id(), dir = %dir.display(), "wrote key pair");
    }

    println!("{jwks_json}");
    Ok(true)
}

pub fn sign(config_path: &Path, request: &RequestArgs<'_>, access_token: Option<&str>) -> Result<bool> {
    for (name, value) in &signed_headers(config_path, request, access_token)? {
        println!("{name}: {}", value.to_str().unwrap_or_default());
    }
    Ok(true)
}

/// Builds and signs the header set that `sign` prints.
fn signed_headers(
    config_path: &Path,
    request: &RequestArgs<'_>,
    access_token: Option<&str>,
) -> Result<HeaderMap> {
    let config = ClientConfig::from_file(config_path)?;
    let signer = config.load_signer()?;

    let mut headers = if request.body.is_some() { default_headers() } else { HeaderMap::new() };
    headers.insert(USER_AGENT, HeaderValue::from_str(config.user_agent())?);
    if let Some(token) = access_token {
        headers.insert(AUTHORIZATION, gnap_authorization(token)?);
    }
    apply_headers(&mut headers, request.headers)?;
    if let Some(body) = request.body {
        if !body.is_empty() && !headers.contains_key(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
    }

    let signed =
        signer.prepare(request.method, request.url, &headers, request.body.map(str::as_bytes))?;
    Ok(signed.headers)
}

pub fn verify(jwks_path: &Path, request: &RequestArgs<'_>) -> Result<bool> {
    let text = fs::read_to_string(jwks_path)
        .with_context(|| format!("reading {}", jwks_path.display()))?;
    let jwks: Jwks = serde_json::from_str(&text).context("parsing JWKS")?;

    let mut headers = HeaderMap::new();
    apply_headers(&mut headers, request.headers)?;

    let key_id = match signature_key_id(&headers) {
        Ok(key_id) => key_id,
        Err(e) => {
            println!("invalid: {e}");
            return Ok(false);
        }
    };
    let Some(jwk) = jwks.find(&key_id) else {
        println!("invalid: no published key has kid `{key_id}`");
        return Ok(false);
    };

    let verifier = SignatureVerifier::from_jwk(jwk)?;
    match verifier.verify_request(request.method, request.url, &headers, request.body.map(str::as_bytes)) {
        Ok(params) => {
            println!("valid (keyid={}, created={})", params.key_id(), params.created());
            Ok(true)
        }
        Err(e) => {
            warn!(error = %e, "request signature rejected");
            println!("invalid: {e}");
            Ok(false)
        }
    }
}

/// Reads the key id declared by the received `sig1` Signature-Input member.
fn signature_key_id(headers: &HeaderMap) -> Result<String> {
    let Some(value) = headers.get("signature-input") else {
        bail!("missing signature-input header");
    };
    let member = value
        .to_str()
        .ok()
        .and_then(|input| input.trim().strip_prefix(SIGNATURE_LABEL))
        .and_then(|rest| rest.strip_prefix('='))
        .with_context(|| format!("signature-input has no {SIGNATURE_LABEL} member"))?;
    Ok(SignatureParams::parse(member)?.key_id().to_owned())
}

pub fn verify_hash(
    client_nonce: &str,
    interact_nonce: &str,
    interact_ref: &str,
    auth_server_url: &str,
    hash: &str,
) -> bool {
    let valid = verify_interaction_hash(client_nonce, interact_nonce, interact_ref, auth_server_url, hash);
    println!("{}", if valid { "valid" } else { "invalid" });
    valid
}

fn apply_headers(headers: &mut HeaderMap, raw: &[String]) -> Result<()> {
    for entry in raw {
        let (name, value) = parse_header(entry)?;
        headers.append(name, value);
    }
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header `{raw}` is not in `Name: value` form");
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("invalid header name in `{raw}`"))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("invalid header value in `{raw}`"))?;
    Ok((name, value))
}
