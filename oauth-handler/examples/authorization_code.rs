//! Walks through the authorization-code flow.
//!
//! Settings come from `oauth.toml` (or the file named by `OAUTH_HANDLER_CONFIG`)
//! and `OAUTH_HANDLER__*` environment variables. The resource URL to call is the
//! first command-line argument.

use anyhow::{Context, Result};
use oauth_handler::{Method, OAuthClient, OAuthSettings, RequestOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let resource_url = std::env::args()
        .nth(1)
        .context("usage: authorization_code <resource-url>")?;

    let settings = OAuthSettings::load()?;
    tracing::info!("Configuration loaded successfully");

    let client = OAuthClient::new(settings)?;
    let authorization = client.build_authorization_url()?;

    println!("Open this URL in your browser and authorize the application:\n");
    println!("{}\n", authorization.url);
    println!("Then paste the full URL you were redirected to:");

    let mut redirect = String::new();
    std::io::stdin().read_line(&mut redirect)?;

    let token = client.fetch_token(redirect.trim()).await?;
    println!("✓ Token received (expires at {:?})", token.expires_at);

    let response = client
        .request(Method::GET, &resource_url, RequestOptions::new())
        .await?;
    println!("{} {}", response.status(), String::from_utf8_lossy(response.body()));

    Ok(())
}
