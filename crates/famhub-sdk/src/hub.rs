use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use famhub_fabric::ListenerCenter;
use famhub_repo::{
    ActivityLogRepository, AuthenticationRepository, FamilyRepository, FamilyRoleRepository,
    InMemoryActivityLogRepository, InMemoryAuthenticationRepository, InMemoryFamilyRepository,
    InMemoryFamilyRoleRepository, InMemoryShoppingRepository, InMemoryTaskRepository,
    ShoppingRepository, TaskRepository,
};
use famhub_store::InMemoryEntityStore;
use famhub_types::{
    default_templates, ActivityAction, ActivityLog, Clock, Family, FamilyRole, SystemClock,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HubConfig;
use crate::error::HubResult;

/// Dependency-injection root: one store, one listener center, and every
/// repository wired to both.
///
/// Hubs are independent. Tests build as many as they need.
pub struct FamilyHub {
    config: HubConfig,
    store: Arc<InMemoryEntityStore>,
    listeners: Arc<ListenerCenter>,
    clock: Arc<dyn Clock>,
    auth: InMemoryAuthenticationRepository,
    families: InMemoryFamilyRepository,
    roles: InMemoryFamilyRoleRepository,
    tasks: InMemoryTaskRepository,
    shopping: InMemoryShoppingRepository,
    activity: InMemoryActivityLogRepository,
}

impl FamilyHub {
    pub fn new(config: HubConfig) -> HubResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a hub whose timestamps come from `clock`.
    pub fn with_clock(config: HubConfig, clock: Arc<dyn Clock>) -> HubResult<Self> {
        let store = Arc::new(InMemoryEntityStore::new());
        let listeners = Arc::new(ListenerCenter::new(&config.delivery)?);

        let hub = Self {
            auth: InMemoryAuthenticationRepository::new(
                Arc::clone(&store),
                Arc::clone(&listeners),
                Arc::clone(&clock),
            ),
            families: InMemoryFamilyRepository::new(Arc::clone(&store), Arc::clone(&listeners)),
            roles: InMemoryFamilyRoleRepository::new(
                Arc::clone(&store),
                Arc::clone(&listeners),
                Arc::clone(&clock),
            )
            .with_fallback_title(&config.roles.fallback_title),
            tasks: InMemoryTaskRepository::new(Arc::clone(&store), Arc::clone(&listeners)),
            shopping: InMemoryShoppingRepository::new(Arc::clone(&store), Arc::clone(&listeners)),
            activity: InMemoryActivityLogRepository::new(
                Arc::clone(&store),
                Arc::clone(&listeners),
            ),
            config,
            store,
            listeners,
            clock,
        };
        info!(
            delivery_thread = %hub.config.delivery.thread_name,
            bootstrap_defaults = hub.config.roles.bootstrap_defaults,
            "family hub ready"
        );
        Ok(hub)
    }

    /// Create `family`, seed its default roles when configured, and record
    /// the creation in its activity log. Returns the family's roles.
    ///
    /// If seeding or logging fails the family is removed again, so an
    /// error leaves no family behind.
    pub fn open_family(&self, family: Family) -> HubResult<Vec<FamilyRole>> {
        let family = self.families.create(family)?;
        if let Err(error) = self.seed_family(&family) {
            warn!(family = %family.id, %error, "opening family failed, removing it");
            if let Err(cleanup) = self.families.delete(&family.id) {
                warn!(family = %family.id, error = %cleanup, "could not remove family");
            }
            return Err(error);
        }
        info!(family = %family.id, "family opened");
        Ok(self.roles.roles(&family.id))
    }

    fn seed_family(&self, family: &Family) -> HubResult<()> {
        if self.config.roles.bootstrap_defaults {
            self.roles.bootstrap_defaults(&family.id, &default_templates())?;
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("name".to_string(), family.name.clone());
        self.activity.append(ActivityLog {
            id: Uuid::now_v7().to_string(),
            family_id: family.id.clone(),
            actor_id: family.owner_id.clone(),
            action: ActivityAction::FamilyUpdated,
            target_id: Some(family.id.clone()),
            message: format!("Created family {}", family.name),
            metadata,
            created_at: self.clock.now(),
        })?;
        Ok(())
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn auth(&self) -> &dyn AuthenticationRepository {
        &self.auth
    }

    pub fn families(&self) -> &dyn FamilyRepository {
        &self.families
    }

    pub fn roles(&self) -> &dyn FamilyRoleRepository {
        &self.roles
    }

    pub fn tasks(&self) -> &dyn TaskRepository {
        &self.tasks
    }

    pub fn shopping(&self) -> &dyn ShoppingRepository {
        &self.shopping
    }

    pub fn activity(&self) -> &dyn ActivityLogRepository {
        &self.activity
    }

    pub fn store(&self) -> &Arc<InMemoryEntityStore> {
        &self.store
    }

    pub fn listeners(&self) -> &Arc<ListenerCenter> {
        &self.listeners
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl fmt::Debug for FamilyHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyHub")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("listeners", &self.listeners)
            .finish()
    }
}
