use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::{CollectionKind, Entity, Scope};

/// Capabilities a role grants within its family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    ManageFamily,
    ManageMembers,
    ManageTasks,
    ManageShopping,
    ViewAnalytics,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::ManageFamily,
        Permission::ManageMembers,
        Permission::ManageTasks,
        Permission::ManageShopping,
        Permission::ViewAnalytics,
    ];
}

/// Presentation and analytics metadata attached to a role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMetadata {
    pub assignment_label: String,
    pub analytics_tag: String,
    pub icon_name: Option<String>,
}

impl RoleMetadata {
    pub fn new(
        assignment_label: impl Into<String>,
        analytics_tag: impl Into<String>,
        icon_name: Option<&str>,
    ) -> Self {
        Self {
            assignment_label: assignment_label.into(),
            analytics_tag: analytics_tag.into(),
            icon_name: icon_name.map(str::to_string),
        }
    }
}

/// A role within a family.
///
/// Within one family the stored roles always satisfy:
/// - `display_order` values are exactly `0..n`, matching the sort order
///   (`display_order`, then `created_at`);
/// - exactly one role has `is_default` set;
/// - titles are unique after trimming and case folding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRole {
    pub id: String,
    #[serde(rename = "familyID")]
    pub family_id: String,
    pub title: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub display_order: i32,
    pub is_default: bool,
    pub metadata: RoleMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FamilyRole {
    /// Requests placement after every existing role on create.
    pub const APPEND: i32 = -1;

    /// Title key used for uniqueness checks: trimmed and lowercased.
    pub fn title_key(&self) -> String {
        normalize_title_key(&self.title)
    }

    /// Stable ordering: display order, then creation time.
    pub fn order_cmp(&self, other: &Self) -> Ordering {
        self.display_order
            .cmp(&other.display_order)
            .then(self.created_at.cmp(&other.created_at))
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Trim and lowercase a title for case-insensitive comparison.
pub fn normalize_title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

impl Entity for FamilyRole {
    const COLLECTION: CollectionKind = CollectionKind::FamilyRoles;

    fn id(&self) -> &str {
        &self.id
    }

    fn scope(&self) -> Scope {
        Scope::family(self.family_id.clone())
    }
}

/// Blueprint for a commonly used role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleTemplate {
    pub title: String,
    pub description: String,
    pub permissions: Vec<Permission>,
    pub metadata: RoleMetadata,
}

impl RoleTemplate {
    /// Build a role from this template with a fresh id.
    pub fn instantiate(
        &self,
        family_id: &str,
        display_order: i32,
        is_default: bool,
        created_at: DateTime<Utc>,
    ) -> FamilyRole {
        FamilyRole {
            id: Uuid::now_v7().to_string(),
            family_id: family_id.to_string(),
            title: self.title.clone(),
            description: Some(self.description.clone()),
            permissions: self.permissions.clone(),
            display_order,
            is_default,
            metadata: self.metadata.clone(),
            created_at,
            updated_at: None,
        }
    }

    /// Copy of this template under a caller-chosen title.
    ///
    /// A blank title leaves the template unchanged.
    pub fn with_title(&self, title: &str) -> Self {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return self.clone();
        }
        let mut template = self.clone();
        template.title = trimmed.to_string();
        template.metadata.assignment_label = format!("Assign to {}", trimmed.to_lowercase());
        template.metadata.analytics_tag = trimmed.to_lowercase().replace(' ', "_");
        template
    }
}

/// The role templates offered to new families.
pub fn default_templates() -> Vec<RoleTemplate> {
    use Permission::*;

    let template = |title: &str, description: &str, permissions: Vec<Permission>, icon: &str| {
        RoleTemplate {
            title: title.to_string(),
            description: description.to_string(),
            permissions,
            metadata: RoleMetadata::new(
                format!("Assign to {}", title.to_lowercase()),
                title.to_lowercase(),
                Some(icon),
            ),
        }
    };

    vec![
        template(
            "Partner",
            "Shares household planning and decisions",
            Permission::ALL.to_vec(),
            "heart.fill",
        ),
        template(
            "Child",
            "Focuses on assigned chores and personal tasks",
            vec![ManageTasks, ManageShopping],
            "figure.and.child.holdinghands",
        ),
        template(
            "Grandparent",
            "Helps with oversight and celebrations",
            vec![ManageFamily, ManageShopping],
            "person.2.square.stack",
        ),
        template(
            "Caregiver",
            "Supports routines and schedules",
            vec![ManageTasks, ManageShopping],
            "stethoscope",
        ),
        template(
            "Pet",
            "Track pet related responsibilities",
            vec![ManageTasks],
            "pawprint.fill",
        ),
    ]
}
