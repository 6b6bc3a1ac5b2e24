use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 50;

/// Foxhole faction a regiment fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Colonial,
    Warden,
}

impl Faction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Faction::Colonial => "colonial",
            Faction::Warden => "warden",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "colonial" | "colonials" => Some(Faction::Colonial),
            "warden" | "wardens" => Some(Faction::Warden),
            _ => None,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A regiment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub discord_guild_id: String,
    pub faction: Option<Faction>,
    pub description: Option<String>,
    /// Tenant-specific settings
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a tenant
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub discord_guild_id: String,
    pub faction: Option<Faction>,
    pub description: Option<String>,
}

impl NewTenant {
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        discord_guild_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            discord_guild_id: discord_guild_id.into(),
            faction: None,
            description: None,
        }
    }

    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = Some(faction);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn into_record(self) -> TenantRecord {
        let now = Utc::now();
        TenantRecord {
            id: Uuid::new_v4(),
            name: self.name,
            slug: self.slug,
            discord_guild_id: self.discord_guild_id,
            faction: self.faction,
            description: self.description,
            config: serde_json::json!({}),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lowercase ASCII letters, digits and inner hyphens, at most 50 chars.
/// All-digit slugs are refused so they never shadow a guild id.
pub fn validate_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.chars().all(|c| c.is_ascii_digit())
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("test-regiment"));
        assert!(validate_slug("7th-logi"));
        assert!(!validate_slug(""));
        assert!(!validate_slug("Test-Regiment"));
        assert!(!validate_slug("-edge"));
        assert!(!validate_slug("edge-"));
        assert!(!validate_slug("has space"));
        assert!(!validate_slug(&"a".repeat(51)));
        assert!(!validate_slug("200"));
        assert!(validate_slug("200th"));
    }

    #[test]
    fn test_faction_parse() {
        assert_eq!(Faction::from_str("Wardens"), Some(Faction::Warden));
        assert_eq!(Faction::from_str("colonial"), Some(Faction::Colonial));
        assert_eq!(Faction::from_str("neutral"), None);
    }

    #[test]
    fn test_new_tenant_defaults() {
        let record = NewTenant::new("Test Regiment", "test-regiment", "987654321")
            .with_faction(Faction::Colonial)
            .into_record();
        assert!(record.is_active);
        assert_eq!(record.config, serde_json::json!({}));
        assert_eq!(record.faction, Some(Faction::Colonial));
        assert_eq!(record.created_at, record.updated_at);
    }
}
