use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A Discord user seen by the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub discord_id: String,
    pub username: String,
    pub display_name: Option<String>,
    /// Global override across every tenant
    pub is_server_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub discord_id: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl NewUser {
    pub fn new(discord_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            discord_id: discord_id.into(),
            username: username.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub(crate) fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            discord_id: self.discord_id,
            username: self.username,
            display_name: self.display_name,
            is_server_admin: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl User {
    /// Name to show in replies
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
