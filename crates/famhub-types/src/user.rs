use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionKind, Entity, Scope};

/// Push-notification token registered by one of the user's devices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub token: String,
    pub last_updated: DateTime<Utc>,
}

/// An application account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "familyID")]
    pub family_id: Option<String>,
    #[serde(rename = "roleIDs")]
    pub role_ids: Vec<String>,
    pub device_tokens: Vec<DeviceToken>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppUser {
    /// A freshly registered, active user with no family yet.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            photo_url: None,
            family_id: None,
            role_ids: Vec::new(),
            device_tokens: Vec::new(),
            is_active: true,
            created_at,
            updated_at: Some(created_at),
        }
    }
}

impl Entity for AppUser {
    const COLLECTION: CollectionKind = CollectionKind::Users;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }
}
