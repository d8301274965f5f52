use secrecy::{ExposeSecret, SecretString};

/// API key/secret pair generated under System > Access > Users on the
/// appliance. Sent as HTTP basic auth on every request.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: SecretString,
}

impl ApiCredentials {
    pub fn new(key: impl Into<String>, secret: SecretString) -> Self {
        Self {
            key: key.into(),
            secret,
        }
    }

    /// Attach basic auth to a request builder.
    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.key, Some(self.secret.expose_secret()))
    }
}
