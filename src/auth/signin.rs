//! Sign-in flows: email/password and Google device code, plus token refresh

use anyhow::{bail, Context, Result};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, DeviceAuthorizationUrl, Scope,
    StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::io::Write;

use super::{AuthConfig, TokenStore};
use crate::config::Config;
use crate::models::UserProfile;

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_BASE: &str = "https://securetoken.googleapis.com/v1";

/// Sign-in response from the identity toolkit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    /// Seconds until expiry, as a decimal string
    expires_in: Option<String>,
    local_id: String,
    display_name: Option<String>,
    email: Option<String>,
}

/// Response from the secure-token refresh endpoint (snake_case keys).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

fn parse_expires_in(raw: &Option<String>) -> Option<u64> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

/// Refresh the identity token using the stored refresh token.
/// Returns Ok(true) if refresh succeeded, Ok(false) if no refresh token exists.
pub async fn refresh() -> Result<bool> {
    let mut config = Config::load()?;
    let refresh_token = match config.get_refresh_token() {
        Some(rt) => rt,
        None => return Ok(false),
    };
    let api_key = config.api_key()?.to_string();

    tracing::info!("Refreshing identity token...");

    let url = format!("{}/token?key={}", SECURE_TOKEN_BASE, api_key);
    let resp = reqwest::Client::new()
        .post(&url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ])
        .send()
        .await
        .context("Token refresh request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Token refresh failed: HTTP {}: {}", status.as_u16(), body);
    }

    let body: RefreshResponse = resp.json().await.context("Failed to parse refresh response")?;

    let expires_in = parse_expires_in(&body.expires_in);
    config.set_id_token(body.id_token, expires_in);
    if let Some(rt) = body.refresh_token {
        config.set_refresh_token(rt);
    }
    if config.user.is_none() {
        if let Some(uid) = body.user_id {
            config.set_user(UserProfile {
                uid,
                display_name: None,
                email: None,
            });
        }
    }

    config.save()?;
    tracing::info!("Token refresh complete");
    Ok(true)
}

/// Perform the sign-in flow. With `google` set, uses the federated device
/// code flow; otherwise prompts for email and password.
pub async fn login(force: bool, google: bool) -> Result<()> {
    {
        let config = Config::load()?;

        if !force {
            if let Some(token) = config.get_id_token() {
                if !token.is_expired() {
                    println!("Already signed in. Use --force to re-authenticate.");
                    return Ok(());
                }
                if config.get_refresh_token().is_some() {
                    tracing::info!("Identity token expired, attempting refresh...");
                    match refresh().await {
                        Ok(true) => {
                            println!("Token refreshed successfully.");
                            return Ok(());
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!("Refresh failed, falling back to sign-in: {:#}", e);
                        }
                    }
                }
            }
        }
    }

    let signin = if google {
        sign_in_with_google().await?
    } else {
        sign_in_with_password().await?
    };

    let mut config = Config::load()?;
    let expires_in = parse_expires_in(&signin.expires_in);
    config.set_id_token(signin.id_token.clone(), expires_in);
    config.set_refresh_token(signin.refresh_token.clone());
    config.set_user(UserProfile {
        uid: signin.local_id.clone(),
        display_name: signin.display_name.clone(),
        email: signin.email.clone(),
    });
    config.save()?;

    println!("Signed in as {}.", config.username());
    Ok(())
}

/// Email/password sign-in against the identity toolkit.
async fn sign_in_with_password() -> Result<SignInResponse> {
    let config = Config::load()?;
    let api_key = config.api_key()?.to_string();

    let email = prompt("Email: ")?;
    let password = prompt_hidden("Password: ")?;
    if email.trim().is_empty() || password.is_empty() {
        println!("Sign in canceled.");
        bail!("Sign in canceled");
    }

    let url = format!(
        "{}/accounts:signInWithPassword?key={}",
        IDENTITY_BASE, api_key
    );
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        }))
        .send()
        .await
        .context("Sign-in request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Sign-in failed: HTTP {}: {}", status.as_u16(), body);
    }

    resp.json().await.context("Failed to parse sign-in response")
}

/// Federated Google sign-in: device code flow, then identity toolkit exchange.
async fn sign_in_with_google() -> Result<SignInResponse> {
    let config = Config::load()?;
    let api_key = config.api_key()?.to_string();

    let auth_config = AuthConfig::google();
    let client = build_client(&auth_config)?;

    tracing::info!("Initiating device code flow...");

    let device_auth_response: StandardDeviceAuthorizationResponse = client
        .exchange_device_code()?
        .add_scope(Scope::new(auth_config.scope.to_string()))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .context("Failed to request device code")?;

    let verification_url = device_auth_response.verification_uri().as_str();
    let user_code = device_auth_response.user_code().secret();

    println!();
    println!("To sign in, visit: {}", verification_url);
    println!("Enter code:        {}", user_code);
    println!();

    tracing::info!("Waiting for authentication...");

    let token_response = match client
        .exchange_device_access_token(&device_auth_response)
        .request_async(oauth2::reqwest::async_http_client, tokio::time::sleep, None)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            // Denied or expired at the provider: show a short notice and
            // end the flow.
            println!("Sign in canceled.");
            return Err(anyhow::Error::new(e).context("Sign in canceled"));
        }
    };

    let provider_token = token_response.access_token().secret();

    // Exchange the provider token for backend identity tokens.
    let url = format!("{}/accounts:signInWithIdp?key={}", IDENTITY_BASE, api_key);
    let post_body = format!(
        "access_token={}&providerId={}",
        provider_token, auth_config.provider_id
    );
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({
            "postBody": post_body,
            "requestUri": "http://localhost",
            "returnSecureToken": true,
        }))
        .send()
        .await
        .context("Identity exchange request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("Identity exchange failed: HTTP {}: {}", status.as_u16(), body);
    }

    resp.json()
        .await
        .context("Failed to parse identity exchange response")
}

/// Build the OAuth2 client from an AuthConfig
fn build_client(auth_config: &AuthConfig) -> Result<BasicClient> {
    let auth_url = AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?;
    let token_url = TokenUrl::new(auth_config.token_url.to_string())?;
    let device_url = DeviceAuthorizationUrl::new(auth_config.device_url.to_string())?;

    Ok(BasicClient::new(
        ClientId::new(auth_config.client_id.to_string()),
        None,
        auth_url,
        Some(token_url),
    )
    .set_device_authorization_url(device_url))
}

/// Clear stored credentials
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Signed out.");
    Ok(())
}

/// Display current auth status
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    match config.get_id_token() {
        Some(token) if !token.is_expired() => {
            println!("Identity token: valid");
            if let Some(exp) = token.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        Some(_) => {
            println!("Identity token: expired");
        }
        None => {
            println!("Identity token: none");
        }
    }

    match config.get_refresh_token() {
        Some(_) => println!("Refresh token:  present"),
        None => println!("Refresh token:  none"),
    }

    match config.user {
        Some(ref user) => {
            println!("Signed in as:   {} ({})", user.name_or_anonymous(), user.uid);
        }
        None => {
            println!("Signed in as:   (nobody)");
        }
    }

    if config.get_id_token().is_none() {
        println!("\nRun 'friendly-cli login' to authenticate.");
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Read a line without echoing (password entry).
fn prompt_hidden(label: &str) -> Result<String> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind};
    use crossterm::terminal;

    print!("{}", label);
    std::io::stdout().flush()?;

    terminal::enable_raw_mode().context("Failed to enter raw mode")?;
    let mut password = String::new();
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Enter => break Ok(password.clone()),
                KeyCode::Esc => break Ok(String::new()),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            },
            Ok(_) => {}
            Err(e) => break Err(anyhow::Error::new(e).context("Failed to read input")),
        }
    };
    terminal::disable_raw_mode().ok();
    println!();
    result
}
