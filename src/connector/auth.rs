//! Credential attachment for orchestrator requests.

use base64::{Engine as _, engine::general_purpose};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Credentials for the orchestrator API.
#[derive(Debug, Clone)]
pub enum Credentials {
    Basic { user: String, password: SecretString },
    Token(SecretString),
}

impl Credentials {
    /// `user:password` selects basic authentication, anything else is a bearer token.
    pub fn parse(value: &SecretString) -> Self {
        match value.expose_secret().split_once(':') {
            Some((user, password)) => Credentials::Basic {
                user: user.to_string(),
                password: SecretString::from(password),
            },
            None => Credentials::Token(value.clone()),
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Basic { user, password } => {
                request.basic_auth(user, Some(password.expose_secret()))
            }
            Credentials::Token(token) => request.bearer_auth(token.expose_secret()),
        }
    }

    /// Value of the `Authorization` header, for transports that build it by hand.
    pub fn header_value(&self) -> String {
        match self {
            Credentials::Basic { user, password } => {
                let pair = format!("{user}:{}", password.expose_secret());
                format!("Basic {}", general_purpose::STANDARD.encode(pair))
            }
            Credentials::Token(token) => format!("Bearer {}", token.expose_secret()),
        }
    }
}
