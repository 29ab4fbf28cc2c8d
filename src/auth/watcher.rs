//! Auth-state notification
//!
//! The session screen reacts to sign-in/sign-out transitions through a watch
//! channel rather than paired attach/detach lifecycle calls: holding the
//! receiver *is* the subscription, and dropping it (on any exit path)
//! detaches it.

use tokio::sync::watch;

use crate::auth::TokenStore;
use crate::config::Config;

/// Session-level authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn { username: String },
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn { .. })
    }
}

/// Receiver half of the auth-state subscription.
pub type AuthStateRx = watch::Receiver<AuthState>;

/// Publishes auth-state transitions to any number of subscribers.
pub struct AuthWatcher {
    tx: watch::Sender<AuthState>,
}

impl AuthWatcher {
    /// Build a watcher whose initial state reflects the stored credentials.
    pub fn from_config(config: &Config) -> Self {
        let initial = match config.get_id_token() {
            Some(token) if !token.is_expired() => AuthState::SignedIn {
                username: config.username(),
            },
            _ => AuthState::SignedOut,
        };
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Acquire an auth-state subscription scoped to the subscriber's lifetime.
    pub fn subscribe(&self) -> AuthStateRx {
        self.tx.subscribe()
    }

    /// Current state snapshot.
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Publish a sign-in transition.
    pub fn signed_in(&self, username: String) {
        self.tx.send_replace(AuthState::SignedIn { username });
    }

    /// Publish a sign-out transition (explicit sign-out or auth loss).
    pub fn signed_out(&self) {
        self.tx.send_replace(AuthState::SignedOut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_starts_signed_out_with_empty_config() {
        let watcher = AuthWatcher::from_config(&Config::default());
        assert_eq!(watcher.current(), AuthState::SignedOut);
    }

    #[test]
    fn transitions_reach_subscribers() {
        let watcher = AuthWatcher::from_config(&Config::default());
        let rx = watcher.subscribe();

        watcher.signed_in("Alice".to_string());
        assert_eq!(
            *rx.borrow(),
            AuthState::SignedIn {
                username: "Alice".to_string()
            }
        );

        watcher.signed_out();
        assert_eq!(*rx.borrow(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn subscriber_observes_change_notification() {
        let watcher = AuthWatcher::from_config(&Config::default());
        let mut rx = watcher.subscribe();

        watcher.signed_in("Bob".to_string());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_signed_in());
    }
}
