pub mod callback;
pub mod client;
pub mod credential;
mod error;
pub mod flow;
pub mod scope;
mod secret;

pub use callback::CallbackListener;
pub use client::{InstalledClient, TokenResponse};
pub use credential::Credential;
pub use error::{Error, Result};
pub use flow::{
    acquire_credential, acquire_credential_with, load_credential, persist_credential,
    print_refresh_token, Browser, InstalledFlow, SystemBrowser,
};
pub use scope::{Scope, ScopeSet};
pub use secret::{ClientSecret, ClientSecretEntry};
