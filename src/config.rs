use url::Url;

/// Host serving the OAuth endpoints.
pub const OAUTH_BASE_URL: &str = "https://api.twitter.com";
/// Host and version prefix of the REST endpoints.
pub const API_BASE_URL: &str = "https://api.twitter.com/1.1";

/// Provider endpoints consumed by the handshake and the banner API.
///
/// All of them are base URLs without a query string, which is what the
/// signer expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub request_token: String,
    pub authorize: String,
    pub access_token: String,
    pub verify_credentials: String,
    pub update_banner: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::from_bases(OAUTH_BASE_URL, API_BASE_URL)
    }
}

impl Endpoints {
    /// Serve every endpoint from `base`, keeping the provider's paths.
    ///
    /// Handy for staging hosts and for mock servers in tests.
    pub fn with_base_url(base: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;
        let root = base.as_str().trim_end_matches('/');
        Ok(Endpoints::from_bases(root, &format!("{}/1.1", root)))
    }

    fn from_bases(oauth: &str, api: &str) -> Self {
        Endpoints {
            request_token: format!("{}/oauth/request_token", oauth),
            authorize: format!("{}/oauth/authorize", oauth),
            access_token: format!("{}/oauth/access_token", oauth),
            verify_credentials: format!("{}/account/verify_credentials.json", api),
            update_banner: format!("{}/account/update_profile_banner.json", api),
        }
    }
}
