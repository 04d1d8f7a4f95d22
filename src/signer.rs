use std::borrow::Cow;
use std::collections::btree_map::{BTreeMap, Entry};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use http::Method;
use sha1::Sha1;
use url::Url;

use crate::encode::{self, generate_nonce, percent_encode};
use crate::{
    SecretsProvider, SignError, SignResult, OAUTH_CALLBACK_KEY, OAUTH_CONSUMER_KEY,
    OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY, OAUTH_SIGNATURE_METHOD_KEY, OAUTH_TIMESTAMP_KEY,
    OAUTH_TOKEN_KEY, OAUTH_VERSION_KEY,
};

type HmacSha1 = Hmac<Sha1>;

/// Value of `oauth_signature_method`.
pub const HMAC_SHA1: &str = "HMAC-SHA1";
/// Value of `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

/// Every parameter covered by a signature: `oauth_*` protocol fields merged
/// with the request's body fields.
///
/// Entries are kept in byte order of their keys, which is the order the
/// signature base string requires. A key may only appear once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureParams(BTreeMap<String, String>);

impl SignatureParams {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add one parameter, failing on a key that is already present.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> SignResult<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        match self.0.entry(key.into()) {
            Entry::Occupied(entry) => Err(SignError::DuplicateParameter(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value.into());
                Ok(())
            }
        }
    }

    pub fn extend<I, K, V>(&mut self, iter: I) -> SignResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        iter.into_iter().try_for_each(|(k, v)| self.insert(k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized parameter string: `k=v` pairs, each side
    /// percent-encoded, joined with `&`.
    pub fn normalized(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// `METHOD&encoded-url&encoded-parameters`.
///
/// `url` must be absolute and must not carry a query string; query
/// parameters belong in `params`.
pub fn signature_base_string(
    method: &Method,
    url: &str,
    params: &SignatureParams,
) -> SignResult<String> {
    let parsed = Url::parse(url).map_err(|_| SignError::InvalidUrl(url.to_string()))?;
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(SignError::InvalidUrl(url.to_string()));
    }
    Ok(format!(
        "{}&{}&{}",
        method.as_str().to_uppercase(),
        percent_encode(parsed.as_str()),
        percent_encode(&params.normalized())
    ))
}

/// `encoded-consumer-secret&encoded-token-secret`, with an empty token part
/// before a token has been issued.
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    )
}

/// HMAC-SHA1 of `base_string` under `signing_key`, base64 encoded.
pub fn sign(base_string: &str, signing_key: &str) -> SignResult<String> {
    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).map_err(|_| SignError::InvalidKey)?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `OAuth k1="v1", k2="v2", ...` in the order given.
pub fn authorization_header<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let fields = params
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}

/// Produce the `Authorization` header for a call signed with `secrets`,
/// using a fresh nonce and the current time.
///
/// `body` lists the form fields that will be sent; they are covered by the
/// signature but do not appear in the header.
pub fn signed_authorization<S>(
    secrets: &S,
    method: &Method,
    url: &str,
    body: &[(&str, &str)],
) -> SignResult<String>
where
    S: SecretsProvider,
{
    Signer::new(secrets, OAuthParameters::new()).sign_parameters(method, url, body.iter().copied())
}

#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
    parameters: OAuthParameters<'a>,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider, parameters: OAuthParameters<'a>) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// Sign a request whose body is the form-encoded `payload`.
    pub fn generate_signature(self, method: &Method, url: &str, payload: &str) -> SignResult<String> {
        let body = url::form_urlencoded::parse(payload.as_bytes());
        self.sign_parameters(method, url, body)
    }

    /// Sign a request carrying the given body fields and return the header.
    pub fn sign_parameters<I, K, V>(self, method: &Method, url: &str, body: I) -> SignResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (consumer_key, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (token, token_secret) = self.secrets.get_token_option_pair();
        let mut oauth = self.parameters.build_options(consumer_key, token);

        let mut params = SignatureParams::new();
        params.extend(body)?;
        params.extend(oauth.iter().map(|(k, v)| (*k, v.as_ref())))?;

        let base = signature_base_string(method, url, &params)?;
        let signature = sign(&base, &signing_key(consumer_secret, token_secret))?;
        oauth.push((OAUTH_SIGNATURE_KEY, Cow::Owned(signature)));

        Ok(authorization_header(
            oauth.iter().map(|(k, v)| (*k, v.as_ref())),
        ))
    }
}

/// The caller-controlled part of the `oauth_*` set.
///
/// Nonce and timestamp default to fresh values at signing time; tests pin
/// them to reproduce known signatures.
#[derive(Debug, Clone)]
pub struct OAuthParameters<'a> {
    callback: Option<Cow<'a, str>>,
    nonce: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
    version: bool,
}

impl Default for OAuthParameters<'_> {
    fn default() -> Self {
        OAuthParameters {
            callback: None,
            nonce: None,
            timestamp: None,
            version: true,
        }
    }
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// set the oauth_callback value
    pub fn callback<T>(self, callback: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            callback: Some(callback.into()),
            ..self
        }
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// Enabled by default. When disabled, oauth_version is left out of the
    /// request entirely, which OAuth 1.0a also accepts.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    fn build_options(
        &self,
        consumer_key: &'a str,
        token: Option<&'a str>,
    ) -> Vec<(&'static str, Cow<'a, str>)> {
        let mut opt: Vec<(&'static str, Cow<'a, str>)> = Vec::with_capacity(8);

        // NOTE: items are pushed in alphabetical order
        if let Some(ref callback) = self.callback {
            opt.push((OAUTH_CALLBACK_KEY, callback.clone()));
        }
        opt.push((OAUTH_CONSUMER_KEY, Cow::Borrowed(consumer_key)));
        let nonce = match self.nonce {
            Some(ref nonce) => nonce.clone(),
            None => Cow::Owned(generate_nonce()),
        };
        opt.push((OAUTH_NONCE_KEY, nonce));
        opt.push((OAUTH_SIGNATURE_METHOD_KEY, Cow::Borrowed(HMAC_SHA1)));
        let timestamp = self.timestamp.unwrap_or_else(encode::timestamp);
        opt.push((OAUTH_TIMESTAMP_KEY, Cow::Owned(timestamp.to_string())));
        if let Some(token) = token {
            opt.push((OAUTH_TOKEN_KEY, Cow::Borrowed(token)));
        }
        if self.version {
            opt.push((OAUTH_VERSION_KEY, Cow::Borrowed(OAUTH_VERSION)));
        }

        opt
    }
}

#[cfg(test)]
pub(crate) fn header_fields(auth_header: &str) -> std::collections::HashMap<String, String> {
    auth_header
        .strip_prefix("OAuth ")
        .unwrap()
        .split(", ")
        .map(|item| item.splitn(2, '=').collect::<Vec<&str>>())
        .filter(|v| v.len() == 2)
        .map(|v| {
            let value = percent_encoding::percent_decode_str(v[1].trim_matches('"'))
                .decode_utf8_lossy()
                .to_string();
            (v[0].to_string(), value)
        })
        .collect()
}
