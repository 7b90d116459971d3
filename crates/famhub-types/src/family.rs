use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionKind, Entity, Scope};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "roleIDs")]
    pub role_ids: Vec<String>,
    pub joined_at: DateTime<Utc>,
    pub invited_by: Option<String>,
}

/// A household. Each family is its own scope, so its change stream is
/// `families/<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    pub members: Vec<FamilyMember>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Family {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

impl Entity for Family {
    const COLLECTION: CollectionKind = CollectionKind::Families;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope(&self) -> Scope {
        Scope::family(self.id.clone())
    }
}
