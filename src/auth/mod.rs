//! Authentication for the FriendlyChat backend
//!
//! Supports email/password sign-in against the identity toolkit plus a
//! federated Google sign-in via OAuth2 device code, exchanged for a backend
//! identity token.

pub mod signin;
pub mod tokens;
pub mod watcher;

pub use signin::{login, logout, status};
pub use tokens::{StoredToken, TokenStore};
pub use watcher::{AuthState, AuthWatcher};

/// Identity provider configuration for the federated sign-in flow
pub struct AuthConfig {
    /// OAuth2 client ID (public installed-app client)
    pub client_id: &'static str,
    /// Device authorization endpoint
    pub device_url: &'static str,
    /// Token endpoint
    pub token_url: &'static str,
    /// Scopes requested from the provider
    pub scope: &'static str,
    /// Provider ID sent to the identity toolkit exchange
    pub provider_id: &'static str,
}

impl AuthConfig {
    /// Config for Google sign-in (device code flow)
    pub fn google() -> Self {
        Self {
            client_id: "407408718192.apps.googleusercontent.com",
            device_url: "https://oauth2.googleapis.com/device/code",
            token_url: "https://oauth2.googleapis.com/token",
            scope: "openid email profile",
            provider_id: "google.com",
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::google()
    }
}
