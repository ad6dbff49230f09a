use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// The client secret file downloaded from the Google Cloud console.
///
/// Desktop clients are stored under `installed`, web clients under `web`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSecret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<ClientSecretEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<ClientSecretEntry>,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientSecretEntry {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub auth_uri: Url,
    pub token_uri: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider_x509_cert_url: Option<Url>,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,
}

impl std::fmt::Debug for ClientSecretEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretEntry")
            .field("client_id", &self.client_id)
            .field("project_id", &self.project_id)
            .field("auth_uri", &self.auth_uri.as_str())
            .field("token_uri", &self.token_uri.as_str())
            .field("client_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ClientSecret {
    #[tracing::instrument(skip_all)]
    pub async fn read_from_file<F>(mut file: F) -> Result<Self>
    where
        F: tokio::io::AsyncRead + Unpin,
    {
        use tokio::io::AsyncReadExt;

        let mut buf = String::new();
        let len = file
            .read_to_string(&mut buf)
            .await
            .map_err(|e| Error::Configuration(format!("could not read client secret: {e}")))?;
        tracing::debug!("read {len} bytes");
        buf.parse()
    }

    /// Opens and parses the client secret file at `path`.
    ///
    /// Missing and malformed files are both reported as
    /// [`Error::Configuration`].
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            Error::Configuration(format!("could not open {}: {e}", path.display()))
        })?;
        Self::read_from_file(file).await
    }

    /// The entry to authorize with, preferring the installed-application one.
    pub fn entry(&self) -> Result<&ClientSecretEntry> {
        let entry = self
            .installed
            .as_ref()
            .or(self.web.as_ref())
            .ok_or_else(|| {
                Error::Configuration("neither `installed` nor `web` client is present".into())
            })?;
        entry.validate()?;
        Ok(entry)
    }

    pub fn into_entry(self) -> Result<ClientSecretEntry> {
        self.entry()?;
        let Self { installed, web } = self;
        installed
            .or(web)
            .ok_or_else(|| Error::Configuration("client secret entry vanished".into()))
    }
}

impl std::str::FromStr for ClientSecret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secret: Self = serde_json::from_str(s)
            .map_err(|e| Error::Configuration(format!("malformed client secret: {e}")))?;
        secret.entry()?;
        Ok(secret)
    }
}

impl ClientSecretEntry {
    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Configuration("client_id is empty".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Configuration("client_secret is empty".into()));
        }
        Ok(())
    }
}
