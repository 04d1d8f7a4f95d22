// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use reqwest::{Client as ReqwestClient, Method};

use crate::{OAuthParameters, SecretsProvider, Signer};

use super::request::RequestBuilder;

/// Turns a `reqwest::Client` into one that signs every request.
pub trait OAuthClientProvider {
    fn oauth1<'a, T>(self, secrets: &'a T) -> Client<Signer<'a, T>>
    where
        Self: Sized,
        T: SecretsProvider,
    {
        self.oauth1_with_params(secrets, OAuthParameters::new())
    }

    fn oauth1_with_params<'a, TSecrets>(
        self,
        secrets: &'a TSecrets,
        params: OAuthParameters<'a>,
    ) -> Client<Signer<'a, TSecrets>>
    where
        Self: Sized,
        TSecrets: SecretsProvider;
}

#[derive(Debug)]
pub struct Client<TSigner> {
    inner: ReqwestClient,
    signer: TSigner,
}

impl OAuthClientProvider for ReqwestClient {
    fn oauth1_with_params<'a, TSecrets>(
        self,
        secrets: &'a TSecrets,
        parameters: OAuthParameters<'a>,
    ) -> Client<Signer<'a, TSecrets>>
    where
        Self: Sized,
        TSecrets: SecretsProvider,
    {
        Client {
            inner: self,
            signer: Signer::new(secrets, parameters),
        }
    }
}

impl<T> Client<T>
where
    T: Clone,
{
    /// Convenience method to make a `GET` request to a URL.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder<T> {
        self.request(Method::GET, url)
    }

    /// Convenience method to make a `POST` request to a URL.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder<T> {
        self.request(Method::POST, url)
    }

    /// Start building a `Request` with the `Method` and `Url`.
    ///
    /// The URL is the signature's base URL and must not carry a query
    /// string; an invalid URL surfaces as a sign error when the request is
    /// sent.
    pub fn request<U: AsRef<str>>(&self, method: Method, url: U) -> RequestBuilder<T> {
        let url = url.as_ref();
        RequestBuilder::new(
            self.inner.request(method.clone(), url),
            method,
            url.to_string(),
            self.signer.clone(),
        )
    }
}
