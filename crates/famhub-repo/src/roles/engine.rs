//! Pure functions that keep a family's role set ordered and single-default.
//!
//! Every function takes the current roles sorted by
//! [`FamilyRole::order_cmp`] and returns the complete next set; nothing here
//! touches the store. The repository runs them inside one write span.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use famhub_fabric::ChangeEvent;
use famhub_types::{normalize_title_key, FamilyRole, Permission, RoleMetadata, RoleTemplate};

use crate::error::{RepositoryError, Result};

/// Title of the role synthesized when a family would otherwise have none.
pub const FALLBACK_TITLE: &str = "Member";

/// Template for the role that replaces the last deleted role.
pub fn fallback_template() -> RoleTemplate {
    RoleTemplate {
        title: FALLBACK_TITLE.to_string(),
        description: "Default household member role".to_string(),
        permissions: vec![Permission::ManageTasks, Permission::ManageShopping],
        metadata: RoleMetadata::new("Assign to member", "member", Some("person.fill")),
    }
}

/// A fresh fallback role: default, order 0.
pub fn fallback_role(family_id: &str, title: &str, now: DateTime<Utc>) -> FamilyRole {
    let mut role = fallback_template()
        .with_title(title)
        .instantiate(family_id, 0, true, now);
    role.updated_at = Some(now);
    role
}

/// Trim the title and fill in derived metadata.
///
/// - blank assignment label: the title
/// - analytics tag: lowercased with spaces as `_`, derived from the title
///   when blank
/// - blank icon name: none
pub fn normalize(mut role: FamilyRole) -> Result<FamilyRole> {
    role.title = role.title.trim().to_string();
    if role.title.is_empty() {
        return Err(RepositoryError::InvalidArgument(
            "Role title cannot be empty.".into(),
        ));
    }

    let metadata = &mut role.metadata;
    metadata.assignment_label = metadata.assignment_label.trim().to_string();
    if metadata.assignment_label.is_empty() {
        metadata.assignment_label = role.title.clone();
    }
    let tag = metadata.analytics_tag.trim();
    let tag = if tag.is_empty() { role.title.as_str() } else { tag };
    metadata.analytics_tag = tag.to_lowercase().replace(' ', "_");
    metadata.icon_name = metadata
        .icon_name
        .as_deref()
        .map(str::trim)
        .filter(|icon| !icon.is_empty())
        .map(str::to_string);

    Ok(role)
}

/// Fail with `AlreadyExists` if another role already uses `title`, ignoring
/// case and surrounding whitespace.
pub fn ensure_unique_title(title: &str, excluding: Option<&str>, roles: &[FamilyRole]) -> Result<()> {
    let key = normalize_title_key(title);
    let taken = roles
        .iter()
        .filter(|r| Some(r.id.as_str()) != excluding)
        .any(|r| r.title_key() == key);
    if taken {
        return Err(RepositoryError::already_exists::<FamilyRole>(title.trim()));
    }
    Ok(())
}

/// Sort, pick the default and renumber.
///
/// Roles are stably sorted by display order, ties broken by creation time.
/// The default is `forced_default` when present in the set, else the current
/// default, else the first role. Orders become `0..n`. `updated_at` moves
/// only on roles whose order or default flag changed here.
pub fn persist(
    mut roles: Vec<FamilyRole>,
    forced_default: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<FamilyRole> {
    if roles.is_empty() {
        return roles;
    }
    roles.sort_by(FamilyRole::order_cmp);

    let default_id = forced_default
        .filter(|id| roles.iter().any(|r| r.id == *id))
        .map(str::to_string)
        .or_else(|| roles.iter().find(|r| r.is_default).map(|r| r.id.clone()))
        .unwrap_or_else(|| roles[0].id.clone());

    for (index, role) in roles.iter_mut().enumerate() {
        let order = index as i32;
        let is_default = role.id == default_id;
        if role.display_order != order || role.is_default != is_default {
            role.display_order = order;
            role.is_default = is_default;
            role.updated_at = Some(now);
        }
    }
    roles
}

/// Assign display orders by position in `ids`.
///
/// `ids` must name every role exactly once: a repeated id is
/// `InvalidArgument`, an unknown or missing one is `NotFound`. The default
/// flag is untouched.
pub fn reorder(roles: Vec<FamilyRole>, ids: &[String], now: DateTime<Utc>) -> Result<Vec<FamilyRole>> {
    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(repeated) = ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(RepositoryError::InvalidArgument(format!(
            "role {repeated} appears more than once"
        )));
    }

    let mut lookup: HashMap<String, FamilyRole> =
        roles.into_iter().map(|r| (r.id.clone(), r)).collect();
    let mut reordered = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let mut role = lookup
            .remove(id)
            .ok_or_else(|| RepositoryError::not_found::<FamilyRole>(id.as_str()))?;
        let order = position as i32;
        if role.display_order != order {
            role.display_order = order;
            role.updated_at = Some(now);
        }
        reordered.push(role);
    }
    if let Some(missing) = lookup.keys().min() {
        return Err(RepositoryError::not_found::<FamilyRole>(missing.as_str()));
    }
    Ok(persist(reordered, None, now))
}

/// Check the stored-state invariants of one family's role set.
pub fn check_invariants(roles: &[FamilyRole]) -> Result<()> {
    let mut orders: Vec<i32> = roles.iter().map(|r| r.display_order).collect();
    orders.sort_unstable();
    if orders.iter().enumerate().any(|(i, order)| *order != i as i32) {
        return Err(RepositoryError::InvariantViolation(format!(
            "display orders are not contiguous: {orders:?}"
        )));
    }

    let defaults = roles.iter().filter(|r| r.is_default).count();
    if !roles.is_empty() && defaults != 1 {
        return Err(RepositoryError::InvariantViolation(format!(
            "expected one default role, found {defaults}"
        )));
    }

    let mut titles = HashSet::with_capacity(roles.len());
    if let Some(dup) = roles.iter().find(|r| !titles.insert(r.title_key())) {
        return Err(RepositoryError::InvariantViolation(format!(
            "duplicate role title {:?}",
            dup.title
        )));
    }
    Ok(())
}

/// Events turning `before` into `after`: `Added` and `Modified` in the new
/// order, then `Removed`.
pub fn diff(before: &[FamilyRole], after: &[FamilyRole]) -> Vec<ChangeEvent<FamilyRole>> {
    let previous: HashMap<&str, &FamilyRole> = before.iter().map(|r| (r.id.as_str(), r)).collect();
    let remaining: HashSet<&str> = after.iter().map(|r| r.id.as_str()).collect();

    let mut events: Vec<ChangeEvent<FamilyRole>> = after
        .iter()
        .filter_map(|role| match previous.get(role.id.as_str()) {
            None => Some(ChangeEvent::Added(role.clone())),
            Some(old) if *old != role => Some(ChangeEvent::Modified(role.clone())),
            Some(_) => None,
        })
        .collect();
    events.extend(
        before
            .iter()
            .filter(|r| !remaining.contains(r.id.as_str()))
            .cloned()
            .map(ChangeEvent::Removed),
    );
    events
}
