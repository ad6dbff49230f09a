use calendar_refresh_token::{acquire_credential, persist_credential, print_refresh_token};
use calendar_refresh_token::{Scope, ScopeSet};
use tracing_subscriber::EnvFilter;

const CLIENT_SECRET_PATH: &str = "credentials.json";
const TOKEN_PATH: &str = "token.pickle";
const CALLBACK_PORT: u16 = 8080;

// If modifying these scopes, delete the file token.pickle.
const SCOPES: &[Scope] = &[Scope::CALENDAR_READONLY];

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let scopes: ScopeSet = SCOPES.iter().cloned().collect();
    let credential = acquire_credential(CLIENT_SECRET_PATH, &scopes, CALLBACK_PORT).await?;

    print_refresh_token(&credential, &mut std::io::stdout().lock())?;

    persist_credential(&credential, TOKEN_PATH).await?;
    Ok(())
}
