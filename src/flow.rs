//! The installed-application authorization flow, end to end.

use std::io::Write;
use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::callback::CallbackListener;
use crate::client::InstalledClient;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::scope::ScopeSet;
use crate::secret::{ClientSecret, ClientSecretEntry};

const STATE_LEN: usize = 30;

/// Where the consent page gets shown.
pub trait Browser {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// The operator's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

impl<B: Browser + ?Sized> Browser for &B {
    fn open(&self, url: &str) -> std::io::Result<()> {
        (**self).open(url)
    }
}

#[derive(Debug, Clone)]
pub struct InstalledFlow {
    secret: ClientSecretEntry,
    scopes: ScopeSet,
}

impl InstalledFlow {
    pub fn new(secret: ClientSecretEntry, scopes: ScopeSet) -> Result<Self> {
        if scopes.is_empty() {
            return Err(Error::Configuration("at least one scope is required".into()));
        }
        Ok(Self { secret, scopes })
    }

    pub async fn from_client_secrets_file<P>(path: P, scopes: &ScopeSet) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let secret = ClientSecret::load(path).await?.into_entry()?;
        Self::new(secret, scopes.clone())
    }

    /// Binds the loopback listener on `port`, sends the operator to the
    /// consent page and exchanges the code the redirect delivers.
    #[tracing::instrument(skip(self, browser))]
    pub async fn run_local_server<B>(&self, port: u16, browser: B) -> Result<Credential>
    where
        B: Browser,
    {
        let listener = CallbackListener::bind(port).await?;
        let client = InstalledClient::builder()
            .redirect_uri(InstalledClient::loopback_redirect_uri(listener.port()))
            .scope(self.scopes.clone())
            .secret(&self.secret)
            .build()?;
        let state = generate_state();
        let url = client.generate_url(&state);

        tracing::info!("Please visit this URL to authorize this application: {url}");
        if let Err(e) = browser.open(&url) {
            tracing::warn!(%e, "could not open a browser; open the URL above manually");
        }

        let code = listener.wait_for_code(&state).await?;
        let credential = client.authorize_with_code(code).await?;
        tracing::info!(
            scopes = %credential.scopes(),
            expiry = ?credential.expiry(),
            "authorized"
        );
        Ok(credential)
    }
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Runs the whole flow against the operator's default browser.
pub async fn acquire_credential<P>(
    client_secret_path: P,
    scopes: &ScopeSet,
    callback_port: u16,
) -> Result<Credential>
where
    P: AsRef<Path>,
{
    acquire_credential_with(client_secret_path, scopes, callback_port, SystemBrowser).await
}

pub async fn acquire_credential_with<P, B>(
    client_secret_path: P,
    scopes: &ScopeSet,
    callback_port: u16,
    browser: B,
) -> Result<Credential>
where
    P: AsRef<Path>,
    B: Browser,
{
    InstalledFlow::from_client_secrets_file(client_secret_path, scopes)
        .await?
        .run_local_server(callback_port, browser)
        .await
}

/// Overwrites `destination_path` with `credential`.
pub async fn persist_credential<P>(credential: &Credential, destination_path: P) -> Result<()>
where
    P: AsRef<Path>,
{
    credential.persist(destination_path).await
}

pub async fn load_credential<P>(path: P) -> Result<Credential>
where
    P: AsRef<Path>,
{
    Credential::load(path).await
}

pub fn print_refresh_token<W>(credential: &Credential, out: &mut W) -> std::io::Result<()>
where
    W: Write + ?Sized,
{
    writeln!(out, "Refresh Token: {}", credential.refresh_token())?;
    out.flush()
}
