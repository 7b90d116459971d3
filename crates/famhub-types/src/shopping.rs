use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionKind, Entity, Scope};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShoppingStatus {
    Pending,
    Purchased,
    Cancelled,
}

/// An entry on the family shopping list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub id: String,
    #[serde(rename = "familyID")]
    pub family_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub status: ShoppingStatus,
    pub created_by: String,
    #[serde(rename = "assigneeID")]
    pub assignee_id: Option<String>,
    pub purchased_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub purchased_at: Option<DateTime<Utc>>,
}

impl Entity for ShoppingItem {
    const COLLECTION: CollectionKind = CollectionKind::ShoppingItems;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope(&self) -> Scope {
        Scope::family(self.family_id.clone())
    }
}
