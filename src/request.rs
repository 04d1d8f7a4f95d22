// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use http::{header::AUTHORIZATION, Method};
use reqwest::{RequestBuilder as ReqwestRequestBuilder, Response};
use serde::Serialize;

use crate::{Result, SecretsProvider, SignResult, Signer};

pub struct RequestBuilder<TSigner>
where
    TSigner: Clone,
{
    method: Method,
    inner: ReqwestRequestBuilder,
    signer: TSigner,
    url: String,
    body: String,
}

impl<'a, TSecretsProvider> RequestBuilder<Signer<'a, TSecretsProvider>>
where
    TSecretsProvider: SecretsProvider + Clone,
{
    // ------------------------------------------------------------------------
    // Finish building the request and send it to server with OAuth signature

    /// Constructs the Request and sends it to the target URL, returning a
    /// future Response.
    ///
    /// # Errors
    ///
    /// This method fails if the request could not be signed, or if there was
    /// an error while sending it.
    pub async fn send(self) -> Result<Response> {
        Ok(self.generate_signature()?.send().await?)
    }

    /// Generate an OAuth signature and return the reqwest's `RequestBuilder`.
    pub fn generate_signature(self) -> SignResult<ReqwestRequestBuilder> {
        let header = self
            .signer
            .generate_signature(&self.method, &self.url, &self.body)?;
        Ok(self.inner.header(AUTHORIZATION, header))
    }
}

impl<TSigner> RequestBuilder<TSigner>
where
    TSigner: Clone,
{
    pub(crate) fn new(
        builder: ReqwestRequestBuilder,
        method: Method,
        url: String,
        signer: TSigner,
    ) -> Self {
        RequestBuilder {
            inner: builder,
            method,
            url,
            body: String::new(),
            signer,
        }
    }

    /// Send a form body.
    ///
    /// The same fields are covered by the OAuth signature.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(body) => {
                self.inner = self.inner.form(form);
                self.body = body;
                self
            }
            Err(_) => self.pass_through(|b| b.form(form)),
        }
    }

    // ------------------------------------------------------------------------
    // Pass-through to inner builder

    fn pass_through<F>(self, f: F) -> Self
    where
        F: FnOnce(ReqwestRequestBuilder) -> ReqwestRequestBuilder,
    {
        RequestBuilder {
            inner: f(self.inner),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::{AUTHORIZATION, CONTENT_TYPE};

    use crate::signer::header_fields;
    use crate::{ConsumerCredentials, OAuthClientProvider, OAuthParameters, SignError};

    #[test]
    fn capture_body() {
        // https://developer.twitter.com/ja/docs/basics/authentication/guides/creating-a-signature
        let endpoint = "https://api.twitter.com/1.1/statuses/update.json";
        let secrets = ConsumerCredentials::new("xvz1evFS4wEEPTGEFPHBog", "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw")
            .token(
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
                "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
            );

        let req = reqwest::Client::new()
            .oauth1(&secrets)
            .post(endpoint)
            .form(&[
                ("include_entities", "true"),
                (
                    "status",
                    "Hello Ladies + Gentlemen, a signed OAuth request!",
                ),
            ]);

        assert_eq!(
            req.body,
            "include_entities=true&status=Hello+Ladies+%2B+Gentlemen%2C+a+signed+OAuth+request%21"
        )
    }

    #[test]
    fn sign_post_body() {
        let endpoint = "https://api.twitter.com/1.1/statuses/update.json";
        let secrets = ConsumerCredentials::new("xvz1evFS4wEEPTGEFPHBog", "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw")
            .token(
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
                "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
            );
        let params = OAuthParameters::new()
            .nonce("kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg")
            .timestamp(1_318_622_958u64);

        let req = reqwest::Client::new()
            .oauth1_with_params(&secrets, params)
            .post(endpoint)
            .form(&[
                ("include_entities", "true"),
                (
                    "status",
                    "Hello Ladies + Gentlemen, a signed OAuth request!",
                ),
            ])
            .generate_signature()
            .unwrap()
            .build()
            .unwrap();

        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(
            header_fields(sign)["oauth_signature"],
            "hCtSmYh+iHYCEqBWrE7C7hYmtUk="
        );
        assert_eq!(
            req.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn sign_post_without_body() {
        // https://tools.ietf.org/html/rfc5849
        let secrets = ConsumerCredentials::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44");
        let params = OAuthParameters::new()
            .nonce("wIjqoS")
            .timestamp(137_131_200u64)
            .callback("http://printer.example.com/ready")
            .version(false);

        let req = reqwest::Client::new()
            .oauth1_with_params(&secrets, params)
            .post("https://photos.example.net/initiate")
            .generate_signature()
            .unwrap()
            .build()
            .unwrap();

        let sign = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(
            header_fields(sign)["oauth_signature"],
            "74KNZJeDHnMBp0EMJ9ZHt/XKycU="
        );
    }

    #[test]
    fn query_in_base_url_is_refused() {
        let secrets = ConsumerCredentials::new("key", "secret");
        let result = reqwest::Client::new()
            .oauth1(&secrets)
            .get("https://photos.example.net/photos?size=original")
            .generate_signature();
        assert!(matches!(result, Err(SignError::InvalidUrl(_))));
    }
}
