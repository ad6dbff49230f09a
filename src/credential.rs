use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{Error, Result};
use crate::scope::ScopeSet;

/// The outcome of one successful authorization code exchange.
///
/// Carries the client identity alongside the tokens so that the persisted
/// file alone is enough to mint new access tokens later.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub(crate) token: String,
    pub(crate) refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id_token: Option<String>,
    /// `None` when the provider did not report a lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) expiry: Option<DateTime<Utc>>,
    pub(crate) scopes: ScopeSet,
    pub(crate) token_uri: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
}

impl Credential {
    /// Short-lived access token.
    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[inline]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    #[inline]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    #[inline]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    #[inline]
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    #[inline]
    pub fn token_uri(&self) -> &Url {
        &self.token_uri
    }

    #[inline]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[inline]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// A credential without a known expiry is never reported as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = CredentialFile {
            format: CredentialFile::FORMAT,
            credential: Cow::Borrowed(self),
        };
        serde_json::to_vec_pretty(&file).map_err(|e| Error::Format(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: CredentialFile<'static> =
            serde_json::from_slice(bytes).map_err(|e| Error::Format(e.to_string()))?;
        if file.format != CredentialFile::FORMAT {
            return Err(Error::Format(format!(
                "unsupported format version {}",
                file.format
            )));
        }
        Ok(file.credential.into_owned())
    }

    /// Replaces `path` with the credential.
    ///
    /// The bytes go to a sibling temporary file (mode 0600 on Unix) which is
    /// then renamed over `path`, so a failed write leaves the previous file
    /// untouched.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn persist<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let tmp_path = temp_path(path);
        if let Err(e) = write_private(&tmp_path, &bytes).await {
            discard(&tmp_path).await;
            return Err(Error::io(format!("could not write {}", tmp_path.display()), e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            discard(&tmp_path).await;
            return Err(Error::io(format!("could not replace {}", path.display()), e));
        }
        tracing::info!("saved credential ({} bytes)", bytes.len());
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(format!("could not read {}", path.display()), e))?;
        Self::from_bytes(&bytes)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(%e, "could not remove {}", path.display());
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .field("token_uri", &self.token_uri.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialFile<'a> {
    format: u32,
    credential: Cow<'a, Credential>,
}

impl CredentialFile<'_> {
    const FORMAT: u32 = 1;
}
