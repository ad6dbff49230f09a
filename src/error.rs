use crate::scope::ScopeSet;

/// Every way the authorization bootstrap can fail. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid client secret configuration: {0}")]
    Configuration(String),
    #[error("cannot listen for the redirect on port {port}")]
    PortUnavailable {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("authorization was denied: {0}")]
    AuthorizationDenied(String),
    #[error("state of the redirect does not match the authorization request")]
    StateMismatch,
    #[error("authorization code was rejected: {0}")]
    InvalidGrant(String),
    #[error("token exchange failed: {message}")]
    TokenExchange {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("granted scope `{granted}` differs from requested scope `{requested}`")]
    ScopeMismatch {
        requested: ScopeSet,
        granted: ScopeSet,
    },
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed credential file: {0}")]
    Format(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn token_exchange<S: Into<String>>(message: S) -> Self {
        Self::TokenExchange {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::TokenExchange {
            message: "request to the token endpoint failed".to_string(),
            source: Some(value),
        }
    }
}
