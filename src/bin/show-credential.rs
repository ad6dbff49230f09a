use calendar_refresh_token::load_credential;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let credential = load_credential("token.pickle").await?;
    println!("scopes: {}", credential.scopes());
    println!("token_uri: {}", credential.token_uri());
    println!("client_id: {}", credential.client_id());
    match credential.expiry() {
        Some(expiry) if credential.is_expired_at(chrono::Utc::now()) => {
            println!("expiry: {expiry} (access token expired)")
        }
        Some(expiry) => println!("expiry: {expiry}"),
        None => println!("expiry: unknown"),
    }
    Ok(())
}
