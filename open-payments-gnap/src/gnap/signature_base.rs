//! Signature base construction per RFC 9421 §2.5.
//!
//! The signature base is the canonical text that gets hashed and signed. It is
//! one line per covered component, in covered order, followed by the
//! `@signature-params` line that declares the same components:
//!
//! ```text
//! "content-type": application/json
//! "content-digest": sha-512=:...:
//! "content-length": 18
//! "authorization": GNAP 123454321
//! "@method": POST
//! "@target-uri": https://example.com/incoming-payments
//! "@signature-params": ("content-type" "content-digest" "content-length" "authorization" "@method" "@target-uri");alg="ed25519";keyid="my-key";created=1700000000
//! ```
//!
//! There is no trailing newline. Signer and verifier must reproduce these
//! bytes exactly.
//!
//! # Coverage Policy
//!
//! [`CoveragePolicy::Default`] covers `content-type`, `content-digest`,
//! `content-length` and `authorization`, each only when present in the
//! request, then always `@method` and `@target-uri`. A request without a body
//! or without an access token simply covers fewer headers.
//!
//! [`CoveragePolicy::Exact`] covers exactly the listed components and fails
//! with [`GnapError::MissingComponent`] if a listed header is absent.

use std::{collections::HashSet, fmt};

use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{GnapError, Result};

/// Label under which the signature is emitted in `Signature-Input` and `Signature`.
pub const SIGNATURE_LABEL: &str = "sig1";

/// Value of the `alg` signature parameter.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// Headers covered by [`CoveragePolicy::Default`] when present, in covered order.
pub const DEFAULT_COVERED_HEADERS: [&str; 4] =
    ["content-type", "content-digest", "content-length", "authorization"];

/// A validated, lowercase HTTP header field name.
///
/// Only obtainable through [`CoveredComponent::header`] or
/// [`CoveredComponent::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderComponent(String);

impl HeaderComponent {
    /// The lowercase field name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One component covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoveredComponent {
    /// A literal HTTP header.
    Header(HeaderComponent),
    /// The `@method` derived component.
    Method,
    /// The `@target-uri` derived component.
    TargetUri,
}

impl CoveredComponent {
    /// Creates a header component, lowercasing the name.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::EncodingFailure`] if `name` is empty or is not an
    /// HTTP field-name token (which also rules out `@`-prefixed names).
    pub fn header(name: &str) -> Result<Self> {
        lowercase_field_name(name).map(Self::Header).map_err(GnapError::EncodingFailure)
    }

    /// Returns the component identifier as it appears in the base.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Header(name) => name.as_str(),
            Self::Method => "@method",
            Self::TargetUri => "@target-uri",
        }
    }

    /// Parses a component identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::SignatureError`] for derived components other than
    /// `@method` and `@target-uri`, and for empty names.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "@method" => Ok(Self::Method),
            "@target-uri" => Ok(Self::TargetUri),
            "" => Err(GnapError::SignatureError("empty component identifier".to_owned())),
            derived if derived.starts_with('@') => Err(GnapError::SignatureError(format!(
                "unsupported derived component `{derived}`"
            ))),
            header => lowercase_field_name(header)
                .map(Self::Header)
                .map_err(GnapError::SignatureError),
        }
    }
}

impl fmt::Display for CoveredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.name())
    }
}

/// Which components a signature covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CoveragePolicy {
    /// [`DEFAULT_COVERED_HEADERS`] that are present, then `@method` and `@target-uri`.
    #[default]
    Default,
    /// Exactly these components, in this order; every header must be present.
    Exact(Vec<CoveredComponent>),
}

impl CoveragePolicy {
    /// Resolves the policy against a concrete header map.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::MissingComponent`] if an `Exact` header is absent
    /// and [`GnapError::SignatureError`] if an `Exact` list repeats a component.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Vec<CoveredComponent>> {
        match self {
            Self::Default => {
                let mut components: Vec<CoveredComponent> = DEFAULT_COVERED_HEADERS
                    .iter()
                    .filter(|name| headers.contains_key(**name))
                    .map(|name| CoveredComponent::Header(HeaderComponent((*name).to_owned())))
                    .collect();
                components.push(CoveredComponent::Method);
                components.push(CoveredComponent::TargetUri);
                Ok(components)
            }
            Self::Exact(components) => {
                let mut seen = HashSet::with_capacity(components.len());
                for component in components {
                    if !seen.insert(component) {
                        return Err(GnapError::SignatureError(format!(
                            "component `{}` listed twice",
                            component.name()
                        )));
                    }
                    if let CoveredComponent::Header(name) = component {
                        if !headers.contains_key(name.as_str()) {
                            return Err(GnapError::MissingComponent(name.as_str().to_owned()));
                        }
                    }
                }
                Ok(components.clone())
            }
        }
    }
}

/// Signature metadata serialized into `Signature-Input` and the base's last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    components: Vec<CoveredComponent>,
    key_id: String,
    created: u64,
}

impl SignatureParams {
    /// Creates signature parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::EncodingFailure`] if `key_id` is empty or cannot be
    /// carried in a structured-field string (quotes, backslashes, non-ASCII).
    pub fn new(components: Vec<CoveredComponent>, key_id: &str, created: u64) -> Result<Self> {
        if key_id.is_empty()
            || !key_id.bytes().all(|b| (b' '..=b'~').contains(&b) && b != b'"' && b != b'\\')
        {
            return Err(GnapError::EncodingFailure(format!("key id `{key_id}` is not a valid sf-string")));
        }
        Ok(Self { components, key_id: key_id.to_owned(), created })
    }

    /// Parses a serialized parameter string such as
    /// `("@method" "@target-uri");alg="ed25519";keyid="k";created=1`.
    ///
    /// Unknown parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::SignatureError`] if the string is malformed, if
    /// `keyid` or `created` are missing, or if `alg` names another algorithm.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| GnapError::SignatureError(format!("{reason}: {value}"));

        let rest = value.trim().strip_prefix('(').ok_or_else(|| invalid("missing component list"))?;
        let (list, params) = rest.split_once(')').ok_or_else(|| invalid("unterminated component list"))?;

        let components = list
            .split_whitespace()
            .map(|item| {
                item.strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .ok_or_else(|| invalid("unquoted component identifier"))
                    .and_then(CoveredComponent::parse)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut key_id = None;
        let mut created = None;
        for param in split_parameters(params).ok_or_else(|| invalid("unterminated string"))? {
            let (name, raw) = param.split_once('=').ok_or_else(|| invalid("parameter without value"))?;
            match name {
                "alg" => {
                    if unquote(raw).as_deref() != Some(SIGNATURE_ALGORITHM) {
                        return Err(GnapError::SignatureError(format!("unsupported algorithm {raw}")));
                    }
                }
                "keyid" => key_id = Some(unquote(raw).ok_or_else(|| invalid("keyid is not a string"))?),
                "created" => {
                    created = Some(raw.parse::<u64>().map_err(|_| invalid("invalid created timestamp"))?);
                }
                _ => {}
            }
        }

        let key_id = key_id.ok_or_else(|| invalid("missing keyid"))?;
        let created = created.ok_or_else(|| invalid("missing created"))?;
        Ok(Self { components, key_id, created })
    }

    /// Covered components, in covered order.
    #[must_use]
    pub fn components(&self) -> &[CoveredComponent] {
        &self.components
    }

    /// Key identifier.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Creation time in Unix seconds.
    #[must_use]
    pub const fn created(&self) -> u64 {
        self.created
    }
}

impl fmt::Display for SignatureParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, component) in self.components.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{component}")?;
        }
        write!(
            f,
            ");alg=\"{SIGNATURE_ALGORITHM}\";keyid=\"{}\";created={}",
            self.key_id, self.created
        )
    }
}

/// Splits `;name=value` parameters, ignoring `;` inside quoted strings.
///
/// Returns `None` if a quoted string is not terminated.
fn split_parameters(params: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in params.bytes().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b';' if !in_string => {
                parts.push(&params[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return None;
    }
    parts.push(&params[start..]);

    Some(parts.into_iter().map(str::trim).filter(|part| !part.is_empty()).collect())
}

/// Decodes an sf-string (`"..."` with `\"` and `\\` escapes).
fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                escaped @ ('"' | '\\') => out.push(escaped),
                _ => return None,
            },
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// A constructed signature base together with the parameters it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBase {
    base: String,
    params: SignatureParams,
}

impl SignatureBase {
    /// The canonical base text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// The declared signature parameters.
    #[must_use]
    pub const fn params(&self) -> &SignatureParams {
        &self.params
    }
}

impl fmt::Display for SignatureBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

/// Builds signature bases for one HTTP request.
///
/// # Examples
///
/// ```
/// use open_payments_gnap::gnap::signature_base::SignatureBaseBuilder;
/// use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
///
/// # fn example() -> open_payments_gnap::Result<()> {
/// let mut headers = HeaderMap::new();
/// headers.insert(AUTHORIZATION, HeaderValue::from_static("GNAP 123454321"));
///
/// let base = SignatureBaseBuilder::new("get", "https://rs.example.com/incoming-payments/", &headers)
///     .build("my-key", 1_700_000_000)?;
///
/// assert_eq!(
///     base.as_str(),
///     "\"authorization\": GNAP 123454321\n\
///      \"@method\": GET\n\
///      \"@target-uri\": https://rs.example.com/incoming-payments\n\
///      \"@signature-params\": (\"authorization\" \"@method\" \"@target-uri\");\
///      alg=\"ed25519\";keyid=\"my-key\";created=1700000000"
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SignatureBaseBuilder<'a> {
    method: &'a str,
    target_uri: &'a str,
    headers: &'a HeaderMap,
    policy: CoveragePolicy,
}

impl<'a> SignatureBaseBuilder<'a> {
    /// Creates a builder using [`CoveragePolicy::Default`].
    #[must_use]
    pub fn new(method: &'a str, target_uri: &'a str, headers: &'a HeaderMap) -> Self {
        Self { method, target_uri, headers, policy: CoveragePolicy::Default }
    }

    /// Replaces the coverage policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CoveragePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the signature base for the given key id and creation time.
    ///
    /// # Errors
    ///
    /// - [`GnapError::MissingComponent`] if an explicitly covered header is absent
    /// - [`GnapError::EncodingFailure`] if a covered value is not visible ASCII
    /// - [`GnapError::InvalidTargetUri`] if the target URI is not absolute
    pub fn build(&self, key_id: &str, created: u64) -> Result<SignatureBase> {
        let components = self.policy.resolve(self.headers)?;
        let params = SignatureParams::new(components, key_id, created)?;
        let base = self.assemble(params.components(), &params.to_string())?;
        Ok(SignatureBase { base, params })
    }

    /// Rebuilds the base for a received signature, using the parameter string
    /// exactly as it was received.
    pub(crate) fn rebuild(&self, components: &[CoveredComponent], raw_params: &str) -> Result<String> {
        for component in components {
            if let CoveredComponent::Header(name) = component {
                if !self.headers.contains_key(name.as_str()) {
                    return Err(GnapError::MissingComponent(name.as_str().to_owned()));
                }
            }
        }
        self.assemble(components, raw_params)
    }

    fn assemble(&self, components: &[CoveredComponent], params: &str) -> Result<String> {
        let mut lines = Vec::with_capacity(components.len() + 1);
        for component in components {
            let value = self.component_value(component)?;
            lines.push(format!("{component}: {value}"));
        }
        lines.push(format!("\"@signature-params\": {params}"));
        Ok(lines.join("\n"))
    }

    fn component_value(&self, component: &CoveredComponent) -> Result<String> {
        match component {
            CoveredComponent::Method => normalize_method(self.method),
            CoveredComponent::TargetUri => normalize_target_uri(self.target_uri),
            CoveredComponent::Header(name) => header_value(self.headers, name.as_str()),
        }
    }
}

/// RFC 9110 `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Lowercases a header field name, rejecting anything that is not a token.
fn lowercase_field_name(name: &str) -> std::result::Result<HeaderComponent, String> {
    if name.is_empty() {
        return Err("empty header name".to_owned());
    }
    if !name.bytes().all(is_token_byte) {
        return Err(format!("`{name}` is not a valid header field name"));
    }
    Ok(HeaderComponent(name.to_ascii_lowercase()))
}

/// Uppercases an HTTP method, rejecting anything that is not a token.
fn normalize_method(method: &str) -> Result<String> {
    if method.is_empty() || !method.bytes().all(is_token_byte) {
        return Err(GnapError::EncodingFailure(format!("invalid HTTP method `{method}`")));
    }
    Ok(method.to_ascii_uppercase())
}

/// Validates an absolute target URI and strips trailing slashes.
///
/// The raw text is kept rather than the parsed URL's serialization, which
/// would add a `/` path to bare origins.
pub(crate) fn normalize_target_uri(target_uri: &str) -> Result<String> {
    let url = Url::parse(target_uri)
        .map_err(|e| GnapError::InvalidTargetUri(format!("{target_uri}: {e}")))?;
    if !url.has_host() {
        return Err(GnapError::InvalidTargetUri(format!("{target_uri}: no authority")));
    }
    if !target_uri.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(GnapError::EncodingFailure(format!(
            "target URI `{target_uri}` contains non-ASCII or whitespace bytes"
        )));
    }
    Ok(target_uri.trim_end_matches('/').to_owned())
}

/// Returns a header's value, joining repeated fields with `, `.
fn header_value(headers: &HeaderMap, name: &str) -> Result<String> {
    let values = headers
        .get_all(name)
        .iter()
        .map(|value| {
            value.to_str().map(str::trim).map_err(|_| {
                GnapError::EncodingFailure(format!("header `{name}` is not visible ASCII"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if values.is_empty() {
        return Err(GnapError::MissingComponent(name.to_owned()));
    }
    Ok(values.join(", "))
}
