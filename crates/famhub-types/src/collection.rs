use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Known collection kinds.
///
/// The path of each kind matches the collection name used by the hosted
/// document backend, so descriptors can be rendered as document paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKind {
    Users,
    Families,
    FamilyRoles,
    Tasks,
    ShoppingItems,
    ActivityLogs,
}

impl CollectionKind {
    /// Every collection kind, in declaration order.
    pub const ALL: [CollectionKind; 6] = [
        CollectionKind::Users,
        CollectionKind::Families,
        CollectionKind::FamilyRoles,
        CollectionKind::Tasks,
        CollectionKind::ShoppingItems,
        CollectionKind::ActivityLogs,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Families => "families",
            CollectionKind::FamilyRoles => "familyRoles",
            CollectionKind::Tasks => "tasks",
            CollectionKind::ShoppingItems => "shoppingItems",
            CollectionKind::ActivityLogs => "activityLogs",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for CollectionKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.path() == s)
            .ok_or_else(|| TypeError::UnknownCollection(s.to_string()))
    }
}

/// Partition key within which entity ids and uniqueness rules are defined.
///
/// Users live in the [`Scope::Global`] partition; everything else is
/// partitioned by a family identifier. Identifiers are opaque strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Family(String),
}

impl Scope {
    pub fn family(id: impl Into<String>) -> Self {
        Scope::Family(id.into())
    }

    /// The family identifier, or `None` for the global scope.
    pub fn family_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Family(id) => Some(id),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("Scope(global)"),
            Scope::Family(id) => write!(f, "Scope({id})"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Family(id) => f.write_str(id),
        }
    }
}

/// Names one change stream: a collection kind within one scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub collection: CollectionKind,
    pub scope: Scope,
}

impl CollectionDescriptor {
    pub fn new(collection: CollectionKind, scope: Scope) -> Self {
        Self { collection, scope }
    }

    /// Descriptor for the stream an entity of type `E` publishes on.
    pub fn of<E: Entity>(scope: Scope) -> Self {
        Self::new(E::COLLECTION, scope)
    }

    /// Document path: `"<collection>"` for the global scope, otherwise
    /// `"<collection>/<scope>"`.
    pub fn path(&self) -> String {
        match &self.scope {
            Scope::Global => self.collection.path().to_string(),
            Scope::Family(id) => format!("{}/{}", self.collection.path(), id),
        }
    }

    /// Parse a document path produced by [`CollectionDescriptor::path`].
    pub fn from_path(path: &str) -> Result<Self, TypeError> {
        match path.split_once('/') {
            None => Ok(Self::new(path.parse()?, Scope::Global)),
            Some((collection, scope)) => {
                let collection = collection.parse()?;
                if scope.is_empty() || scope.contains('/') {
                    return Err(TypeError::InvalidScope {
                        path: path.to_string(),
                        reason: "scope must be a single non-empty segment".into(),
                    });
                }
                Ok(Self::new(collection, Scope::family(scope)))
            }
        }
    }
}

impl fmt::Display for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A record with a stable string identifier that belongs to exactly one
/// collection kind and one scope.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The collection every value of this type belongs to.
    const COLLECTION: CollectionKind;

    fn id(&self) -> &str;

    fn scope(&self) -> Scope;

    /// Descriptor of the change stream this entity publishes on.
    fn descriptor(&self) -> CollectionDescriptor {
        CollectionDescriptor::new(Self::COLLECTION, self.scope())
    }
}
