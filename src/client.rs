use std::borrow::Cow;

use chrono::{DateTime, TimeDelta, Utc};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::scope::{Scope, ScopeSet};
use crate::secret::ClientSecretEntry;

pub mod wire;

pub use wire::{AuthorizationCode, Bearer, ErrorResponse, TokenResponse};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub redirect_uri: String,
    pub scope: ScopeSet,
}

/// An OAuth2 client registered as an installed application, before any
/// token has been issued to it.
#[derive(Debug, Clone)]
pub struct InstalledClient {
    secret: ClientSecretEntry,
    config: ClientConfig,
    client: reqwest::Client,
}

impl InstalledClient {
    pub fn new(secret: ClientSecretEntry, config: ClientConfig) -> Self {
        Self {
            secret,
            config,
            client: Default::default(),
        }
    }

    pub fn builder() -> InstalledClientBuilder {
        InstalledClientBuilder::default()
    }

    /// Loopback redirect target for a listener on `port`.
    pub fn loopback_redirect_uri(port: u16) -> String {
        format!("http://localhost:{port}/")
    }

    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Consent page URL. `state` is echoed back on the redirect.
    pub fn generate_url(&self, state: &str) -> String {
        use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

        let Self { secret, config, .. } = self;
        let ClientSecretEntry {
            client_id,
            auth_uri,
            ..
        } = secret;
        let ClientConfig {
            redirect_uri,
            scope,
        } = config;
        let client_id = utf8_percent_encode(client_id, NON_ALPHANUMERIC);
        let redirect_uri = utf8_percent_encode(redirect_uri, NON_ALPHANUMERIC);
        let scope = scope.to_string();
        let scope = utf8_percent_encode(&scope, NON_ALPHANUMERIC);
        let state = utf8_percent_encode(state, NON_ALPHANUMERIC);
        let query = [
            "response_type=code".to_string(),
            format!("client_id={client_id}"),
            format!("redirect_uri={redirect_uri}"),
            format!("scope={scope}"),
            format!("state={state}"),
            "access_type=offline".to_string(),
        ]
        .join("&");
        format!("{auth_uri}?{query}")
    }

    #[tracing::instrument(skip_all)]
    pub async fn acquire_token_with<'a, S>(&'a self, code: S) -> Result<TokenResponse>
    where
        S: Into<Cow<'a, str>>,
    {
        let Self {
            secret,
            config: ClientConfig { redirect_uri, .. },
            client,
        } = self;
        let ClientSecretEntry {
            client_id,
            token_uri,
            client_secret,
            ..
        } = secret;
        let request = wire::TokenRequest {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: code.into(),
            grant_type: AuthorizationCode::new(),
            redirect_uri: redirect_uri.into(),
        };
        let response = client
            .post(token_uri.clone())
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(request.urlencoded())
            .send()
            .await
            .inspect_err(|err| {
                let err = err as &dyn std::error::Error;
                tracing::error!(err, "could not send token request");
            })?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Self::rejection(status, &body));
        }
        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(%e, "could not parse token response body as JSON");
            Error::token_exchange(format!("malformed token response: {e}"))
        })?;
        tracing::debug!(?token, "token endpoint answered");
        Ok(token)
    }

    fn rejection(status: http::StatusCode, body: &str) -> Error {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(error) if error.is_invalid_grant() => Error::InvalidGrant(error.to_string()),
            Ok(error) => Error::token_exchange(format!("{status}: {error}")),
            Err(_) => Error::token_exchange(format!("{status}: {body}")),
        }
    }

    /// Exchanges `code` and turns the answer into a [`Credential`] issued
    /// for exactly the configured scope.
    pub async fn authorize_with_code<'a, S>(&'a self, code: S) -> Result<Credential>
    where
        S: Into<Cow<'a, str>>,
    {
        let token = self.acquire_token_with(code).await?;
        self.credential_from(token, Utc::now())
    }

    pub fn credential_from(
        &self,
        token: TokenResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<Credential> {
        let TokenResponse {
            access_token,
            expires_in,
            refresh_token,
            scope,
            id_token,
            ..
        } = token;
        let requested = &self.config.scope;
        let granted = scope.unwrap_or_else(|| requested.clone());
        if &granted != requested {
            return Err(Error::ScopeMismatch {
                requested: requested.clone(),
                granted,
            });
        }
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Err(Error::token_exchange(
                "no refresh token was issued; revoke the app's access and authorize again",
            ));
        };
        let expiry = expires_in
            .map(|secs| {
                TimeDelta::try_seconds(secs)
                    .and_then(|delta| issued_at.checked_add_signed(delta))
                    .ok_or_else(|| {
                        Error::token_exchange(format!("expires_in {secs} out of range"))
                    })
            })
            .transpose()?;
        let ClientSecretEntry {
            client_id,
            client_secret,
            token_uri,
            ..
        } = &self.secret;
        Ok(Credential {
            token: access_token,
            refresh_token,
            id_token,
            expiry,
            scopes: granted,
            token_uri: token_uri.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstalledClientBuilder {
    redirect_uri: Option<String>,
    scope: ScopeSet,
    secret: Option<ClientSecretEntry>,
}

impl InstalledClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_uri<'s, S>(self, uri: S) -> Self
    where
        S: Into<Cow<'s, str>>,
    {
        let uri = uri.into().into_owned();
        Self {
            redirect_uri: Some(uri),
            ..self
        }
    }

    pub fn add_scope(self, scope: Scope) -> Self {
        Self {
            scope: self.scope.with(scope),
            ..self
        }
    }

    pub fn scope(self, scope: ScopeSet) -> Self {
        Self { scope, ..self }
    }

    pub fn secret(self, secret: &ClientSecretEntry) -> Self {
        let secret = secret.clone();
        Self {
            secret: Some(secret),
            ..self
        }
    }

    pub fn build(self) -> Result<InstalledClient> {
        let Self {
            redirect_uri,
            scope,
            secret,
        } = self;
        let redirect_uri = redirect_uri
            .ok_or_else(|| Error::Configuration("redirect_uri is required".into()))?;
        if scope.is_empty() {
            return Err(Error::Configuration("at least one scope is required".into()));
        }
        let secret = secret.ok_or_else(|| Error::Configuration("secret is required".into()))?;
        let config = ClientConfig {
            redirect_uri,
            scope,
        };
        Ok(InstalledClient::new(secret, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::ClientSecret;

    fn secret(token_uri: &str) -> ClientSecretEntry {
        let payload = serde_json::json!({
            "installed": {
                "client_id": "1234.apps.googleusercontent.com",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": token_uri,
                "client_secret": "GOCSPX-secret",
            }
        });
        let secret: ClientSecret = serde_json::from_value(payload).unwrap();
        secret.into_entry().unwrap()
    }

    fn client(token_uri: &str) -> InstalledClient {
        InstalledClient::builder()
            .redirect_uri(InstalledClient::loopback_redirect_uri(8080))
            .add_scope(Scope::CALENDAR_READONLY)
            .secret(&secret(token_uri))
            .build()
            .unwrap()
    }

    fn token_response(scope: Option<&str>, refresh_token: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "ya29.a0".to_string(),
            expires_in: Some(3599),
            refresh_token: refresh_token.map(str::to_string),
            scope: scope.map(|s| s.parse().unwrap()),
            token_type: Bearer::new(),
            id_token: None,
        }
    }

    #[test]
    fn test_builder_requires_scope() {
        let err = InstalledClient::builder()
            .redirect_uri("http://localhost:8080/")
            .secret(&secret("https://oauth2.googleapis.com/token"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_generate_url() {
        let url = client("https://oauth2.googleapis.com/token").generate_url("xyz");
        let url = url::Url::parse(&url).unwrap();
        assert_eq!(url.path(), "/o/oauth2/auth");
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "1234.apps.googleusercontent.com");
        assert_eq!(query["redirect_uri"], "http://localhost:8080/");
        assert_eq!(query["scope"], Scope::CALENDAR_READONLY.as_str());
        assert_eq!(query["state"], "xyz");
        assert_eq!(query["access_type"], "offline");
    }

    #[test]
    fn test_credential_from_token() {
        let client = client("https://oauth2.googleapis.com/token");
        let issued_at = Utc::now();
        let token = token_response(Some(Scope::CALENDAR_READONLY.as_str()), Some("1//0g"));
        let credential = client.credential_from(token, issued_at).unwrap();
        assert_eq!(credential.refresh_token(), "1//0g");
        assert_eq!(credential.scopes(), &crate::scope_set![calendar.readonly]);
        assert_eq!(credential.expiry(), Some(issued_at + TimeDelta::seconds(3599)));
        assert_eq!(credential.client_id(), "1234.apps.googleusercontent.com");
    }

    #[test]
    fn test_credential_without_scope_uses_requested() {
        let client = client("https://oauth2.googleapis.com/token");
        let credential = client
            .credential_from(token_response(None, Some("1//0g")), Utc::now())
            .unwrap();
        assert_eq!(credential.scopes(), &client.config().scope);
    }

    #[test]
    fn test_credential_scope_mismatch() {
        let client = client("https://oauth2.googleapis.com/token");
        let granted = format!("{} {}", Scope::CALENDAR_READONLY, Scope::CALENDAR);
        let err = client
            .credential_from(token_response(Some(granted.as_str()), Some("1//0g")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch { .. }));
    }

    #[test]
    fn test_credential_requires_refresh_token() {
        let client = client("https://oauth2.googleapis.com/token");
        let err = client
            .credential_from(token_response(None, None), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange { .. }));
    }

    #[test]
    fn test_credential_expires_in_out_of_range() {
        let client = client("https://oauth2.googleapis.com/token");
        for expires_in in [i64::MAX, i64::MIN] {
            let token = TokenResponse {
                expires_in: Some(expires_in),
                ..token_response(None, Some("1//0g"))
            };
            let err = client.credential_from(token, Utc::now()).unwrap_err();
            assert!(matches!(err, Error::TokenExchange { .. }));
        }

        let near_max = DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(10);
        let err = client
            .credential_from(token_response(None, Some("1//0g")), near_max)
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange { .. }));
    }

    #[test]
    fn test_credential_without_expires_in() {
        let client = client("https://oauth2.googleapis.com/token");
        let token = TokenResponse {
            expires_in: None,
            ..token_response(None, Some("1//0g"))
        };
        let credential = client.credential_from(token, Utc::now()).unwrap();
        assert_eq!(credential.expiry(), None);
        assert!(!credential.is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_acquire_token_huge_expires_in() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.a0",
                "expires_in": i64::MAX,
                "refresh_token": "1//0g",
                "scope": Scope::CALENDAR_READONLY.as_str(),
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/token", server.uri()));
        let err = client.authorize_with_code("code").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange { .. }));
    }

    #[tokio::test]
    async fn test_acquire_token_malformed_body() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/token", server.uri()));
        let err = client.acquire_token_with("code").await.unwrap_err();
        let Error::TokenExchange { message, source } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("malformed"));
        assert!(source.is_none());
    }

    #[tokio::test]
    async fn test_acquire_token_unreachable_endpoint() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = client(&format!("http://127.0.0.1:{port}/token"));
        let err = client.acquire_token_with("code").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange { source: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_acquire_token_invalid_grant() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Malformed auth code."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/token", server.uri()));
        let err = client.acquire_token_with("expired").await.unwrap_err();
        assert!(matches!(err, Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn test_acquire_token_server_error() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/token", server.uri()));
        let err = client.acquire_token_with("code").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange { .. }));
    }
}
