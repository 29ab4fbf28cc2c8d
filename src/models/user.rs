//! User-related models

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user, as returned by the identity endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    /// Display name, falling back to "anonymous" for accounts that never
    /// set one.
    pub fn name_or_anonymous(&self) -> &str {
        self.display_name.as_deref().unwrap_or("anonymous")
    }
}
