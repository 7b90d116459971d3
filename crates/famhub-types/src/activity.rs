use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionKind, Entity, Scope};

/// What happened in an [`ActivityLog`] entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityAction {
    UserInvited,
    UserJoined,
    UserRemoved,
    RoleUpdated,
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    TaskDeleted,
    ShoppingItemAdded,
    ShoppingItemPurchased,
    ShoppingItemDeleted,
    FamilyUpdated,
}

/// Append-only audit entry for a family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    #[serde(rename = "familyID")]
    pub family_id: String,
    #[serde(rename = "actorID")]
    pub actor_id: String,
    pub action: ActivityAction,
    #[serde(rename = "targetID")]
    pub target_id: Option<String>,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ActivityLog {
    const COLLECTION: CollectionKind = CollectionKind::ActivityLogs;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope(&self) -> Scope {
        Scope::family(self.family_id.clone())
    }
}
