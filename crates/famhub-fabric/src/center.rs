use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use famhub_types::{CollectionDescriptor, Entity};

use crate::config::FabricConfig;
use crate::error::{ListenerError, Result};
use crate::event::{ChangeEvent, Delivery};
use crate::lane::DeliveryLane;
use crate::token::{ListenerId, ListenerToken};

type Handler<T> = Arc<dyn Fn(Delivery<T>) + Send + Sync>;

/// One registration: a descriptor, its handler, and its liveness flag.
struct Listener<T> {
    descriptor: CollectionDescriptor,
    handler: Handler<T>,
    active: Arc<AtomicBool>,
}

/// Every listener registered for one entity type, in registration order.
struct Topic<T> {
    listeners: BTreeMap<ListenerId, Listener<T>>,
}

trait AnyTopic: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove(&mut self, id: ListenerId) -> bool;
    fn len(&self) -> usize;
}

impl<T: Entity> AnyTopic for Topic<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// A listener selected for one delivery.
struct Target<T> {
    id: ListenerId,
    handler: Handler<T>,
    active: Arc<AtomicBool>,
}

/// Listener table, keyed by entity type.
///
/// Each entity type owns its own typed topic; a topic is only reachable
/// through the `TypeId` of its own type.
pub(crate) struct Registry {
    topics: RwLock<HashMap<TypeId, Box<dyn AnyTopic>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn register<T: Entity>(
        &self,
        descriptor: CollectionDescriptor,
        handler: Handler<T>,
    ) -> (ListenerId, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let listener = Listener {
            descriptor,
            handler,
            active: Arc::clone(&active),
        };

        let mut topics = self.topics.write().expect("registry lock poisoned");
        let topic = topics
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Topic::<T> {
                    listeners: BTreeMap::new(),
                })
            })
            .as_any_mut()
            .downcast_mut::<Topic<T>>()
            .expect("topic is keyed by its own TypeId");
        topic.listeners.insert(id, listener);
        (id, active)
    }

    fn matching<T: Entity>(&self, descriptor: &CollectionDescriptor) -> Vec<Target<T>> {
        let topics = self.topics.read().expect("registry lock poisoned");
        let Some(topic) = topics
            .get(&TypeId::of::<T>())
            .and_then(|t| t.as_any().downcast_ref::<Topic<T>>())
        else {
            return Vec::new();
        };
        topic
            .listeners
            .iter()
            .filter(|(_, l)| &l.descriptor == descriptor && l.active.load(Ordering::Acquire))
            .map(|(id, l)| Target {
                id: *id,
                handler: Arc::clone(&l.handler),
                active: Arc::clone(&l.active),
            })
            .collect()
    }

    pub(crate) fn remove(&self, type_id: TypeId, id: ListenerId) -> bool {
        let mut topics = self.topics.write().expect("registry lock poisoned");
        topics
            .get_mut(&type_id)
            .map(|topic| topic.remove(id))
            .unwrap_or(false)
    }

    fn len(&self) -> usize {
        self.topics
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|t| t.len())
            .sum()
    }
}

/// Invoke each still-active target with its own copy of `delivery`.
///
/// Runs on the delivery lane. A panicking handler is logged, deactivated,
/// and deregistered; the remaining targets still receive the batch.
fn dispatch<T: Entity>(registry: &Weak<Registry>, targets: Vec<Target<T>>, delivery: Delivery<T>) {
    for target in targets {
        if !target.active.load(Ordering::Acquire) {
            continue;
        }
        let handler = Arc::clone(&target.handler);
        let payload = delivery.clone();
        if catch_unwind(AssertUnwindSafe(move || handler(payload))).is_err() {
            warn!(
                listener = target.id,
                collection = %T::COLLECTION,
                "listener panicked, removing it"
            );
            target.active.store(false, Ordering::Release);
            if let Some(registry) = registry.upgrade() {
                registry.remove(TypeId::of::<T>(), target.id);
            }
        }
    }
}

/// Typed publish/subscribe hub for entity change events.
///
/// Listeners register for a [`CollectionDescriptor`] and an entity type `T`;
/// [`ListenerCenter::publish`] hands each batch to the delivery lane, which
/// invokes matching handlers in publish order on its own thread.
pub struct ListenerCenter {
    registry: Arc<Registry>,
    lane: DeliveryLane,
}

impl ListenerCenter {
    /// Create a center and start its delivery thread.
    pub fn new(config: &FabricConfig) -> Result<Self> {
        let lane = DeliveryLane::spawn(&config.thread_name)?;
        info!(thread = %config.thread_name, "listener center started");
        Ok(Self {
            registry: Arc::new(Registry::new()),
            lane,
        })
    }

    /// Register `handler` for batches of `T` published on `descriptor`.
    ///
    /// Effective immediately: every publish that starts after this returns
    /// reaches the handler.
    pub fn listen<T, F>(&self, descriptor: CollectionDescriptor, handler: F) -> ListenerToken
    where
        T: Entity,
        F: Fn(Delivery<T>) + Send + Sync + 'static,
    {
        let handler: Handler<T> = Arc::new(handler);
        let (id, active) = self.register(descriptor, handler);
        self.token_for::<T>(id, active)
    }

    /// Register `handler` and queue `initial` for it alone, ahead of any
    /// later publish.
    ///
    /// Callers that hold a consistent snapshot of the current state pass it
    /// here as `Added` events; an empty `initial` queues nothing.
    pub fn listen_with_replay<T, F>(
        &self,
        descriptor: CollectionDescriptor,
        initial: Vec<ChangeEvent<T>>,
        handler: F,
    ) -> ListenerToken
    where
        T: Entity,
        F: Fn(Delivery<T>) + Send + Sync + 'static,
    {
        let handler: Handler<T> = Arc::new(handler);
        let (id, active) = self.register(descriptor, Arc::clone(&handler));
        let token = self.token_for::<T>(id, Arc::clone(&active));
        if !initial.is_empty() {
            let target = Target {
                id,
                handler,
                active,
            };
            let registry = Arc::downgrade(&self.registry);
            self.lane
                .enqueue(Box::new(move || dispatch(&registry, vec![target], Ok(initial))));
        }
        token
    }

    /// Like [`ListenerCenter::listen`], but deliveries arrive on a channel.
    pub fn stream<T: Entity>(
        &self,
        descriptor: CollectionDescriptor,
    ) -> (ListenerToken, UnboundedReceiver<Delivery<T>>) {
        self.stream_with_replay(descriptor, Vec::new())
    }

    /// Like [`ListenerCenter::listen_with_replay`], but deliveries arrive on
    /// a channel. The receiver ends once the token is cancelled and every
    /// queued delivery has run.
    pub fn stream_with_replay<T: Entity>(
        &self,
        descriptor: CollectionDescriptor,
        initial: Vec<ChangeEvent<T>>,
    ) -> (ListenerToken, UnboundedReceiver<Delivery<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.listen_with_replay(descriptor, initial, move |delivery| {
            let _ = tx.send(delivery);
        });
        (token, rx)
    }

    /// Deregister the listener behind `token`. Same as [`ListenerToken::cancel`].
    pub fn remove_listener(&self, token: &ListenerToken) {
        token.cancel();
    }

    /// Deliver `events` as one batch to every matching listener.
    ///
    /// Never blocks on handlers and never fails; an empty batch is dropped.
    pub fn publish<T: Entity>(&self, descriptor: &CollectionDescriptor, events: Vec<ChangeEvent<T>>) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        self.broadcast(descriptor, Ok(events));
        debug!(descriptor = %descriptor, events = count, "batch published");
    }

    /// Deliver a failure to every matching listener instead of a batch.
    pub fn publish_error<T: Entity>(&self, descriptor: &CollectionDescriptor, error: ListenerError) {
        warn!(descriptor = %descriptor, %error, "publishing listener error");
        self.broadcast::<T>(descriptor, Err(error));
    }

    /// Block until every delivery queued before this call has run.
    ///
    /// A no-op when called from inside a handler.
    pub fn flush(&self) {
        self.lane.flush();
    }

    /// Number of live registrations across all types.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    fn register<T: Entity>(
        &self,
        descriptor: CollectionDescriptor,
        handler: Handler<T>,
    ) -> (ListenerId, Arc<AtomicBool>) {
        debug!(descriptor = %descriptor, "listener registered");
        self.registry.register(descriptor, handler)
    }

    fn token_for<T: Entity>(&self, id: ListenerId, active: Arc<AtomicBool>) -> ListenerToken {
        ListenerToken::new(id, TypeId::of::<T>(), active, Arc::downgrade(&self.registry))
    }

    fn broadcast<T: Entity>(&self, descriptor: &CollectionDescriptor, delivery: Delivery<T>) {
        let targets = self.registry.matching::<T>(descriptor);
        if targets.is_empty() {
            return;
        }
        let registry = Arc::downgrade(&self.registry);
        self.lane
            .enqueue(Box::new(move || dispatch(&registry, targets, delivery)));
    }
}

impl std::fmt::Debug for ListenerCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerCenter")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use famhub_types::{CollectionKind, Scope};
    use std::sync::mpsc as std_mpsc;
    use std::sync::Mutex;
    use std::thread;

    #[derive(Clone, Debug, PartialEq)]
    struct Ping {
        id: String,
        family: String,
    }

    impl Entity for Ping {
        const COLLECTION: CollectionKind = CollectionKind::Tasks;

        fn id(&self) -> &str {
            &self.id
        }

        fn scope(&self) -> Scope {
            Scope::family(self.family.clone())
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Pong {
        id: String,
    }

    impl Entity for Pong {
        const COLLECTION: CollectionKind = CollectionKind::Tasks;

        fn id(&self) -> &str {
            &self.id
        }

        fn scope(&self) -> Scope {
            Scope::Global
        }
    }

    fn ping(id: &str) -> Ping {
        Ping {
            id: id.into(),
            family: "f1".into(),
        }
    }

    fn tasks(family: &str) -> CollectionDescriptor {
        CollectionDescriptor::new(CollectionKind::Tasks, Scope::family(family))
    }

    fn center() -> ListenerCenter {
        ListenerCenter::new(&FabricConfig::default()).unwrap()
    }

    /// Collects every delivery a listener receives.
    fn recorder<T: Entity>() -> (Arc<Mutex<Vec<Delivery<T>>>>, impl Fn(Delivery<T>) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |d| sink.lock().unwrap().push(d))
    }

    fn ids(delivery: &Delivery<Ping>) -> Vec<String> {
        delivery
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.entity().id.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    #[test]
    fn delivers_batch_to_matching_listener() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a")), ChangeEvent::Modified(ping("a"))]);
        center.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let batch = seen[0].as_ref().unwrap();
        assert_eq!(batch[0], ChangeEvent::Added(ping("a")));
        assert_eq!(batch[1], ChangeEvent::Modified(ping("a")));
    }

    #[test]
    fn other_scopes_are_not_delivered() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        center.publish(&tasks("f2"), vec![ChangeEvent::Added(ping("a"))]);
        center.flush();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_only_see_their_own_type() {
        let center = center();
        let (pings, ping_handler) = recorder::<Ping>();
        let (pongs, pong_handler) = recorder::<Pong>();
        let _a = center.listen(tasks("f1"), ping_handler);
        let _b = center.listen(tasks("f1"), pong_handler);

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        center.flush();

        assert_eq!(pings.lock().unwrap().len(), 1);
        assert!(pongs.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_batches_are_dropped() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        center.publish::<Ping>(&tasks("f1"), Vec::new());
        center.flush();
        assert!(seen.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Ordering and batching
    // -----------------------------------------------------------------------

    #[test]
    fn sequential_publishes_arrive_in_order() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        for i in 0..100 {
            center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping(&i.to_string()))]);
        }
        center.flush();

        let order: Vec<String> = seen.lock().unwrap().iter().flat_map(ids).collect();
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn concurrent_batches_are_never_split() {
        let center = Arc::new(center());
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let center = Arc::clone(&center);
                thread::spawn(move || {
                    for round in 0..10 {
                        let batch = (0..10)
                            .map(|i| ChangeEvent::Added(ping(&format!("{worker}-{round}-{i}"))))
                            .collect();
                        center.publish(&tasks("f1"), batch);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        center.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 40);
        for delivery in seen.iter() {
            let ids = ids(delivery);
            assert_eq!(ids.len(), 10);
            let prefix = ids[0].rsplit_once('-').unwrap().0.to_string();
            assert!(ids.iter().all(|id| id.starts_with(&prefix)));
        }
    }

    #[test]
    fn delivery_runs_off_the_publisher_thread() {
        let center = center();
        let publisher = thread::current().id();
        let delivered_on = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&delivered_on);
        let _token = center.listen(tasks("f1"), move |_: Delivery<Ping>| {
            *slot.lock().unwrap() = Some(thread::current().id());
        });

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        center.flush();
        let delivered_on = delivered_on.lock().unwrap().expect("should be delivered");
        assert_ne!(delivered_on, publisher);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn cancelled_listener_receives_nothing_further() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let token = center.listen(tasks("f1"), handler);

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        center.flush();
        token.cancel();
        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("b"))]);
        center.flush();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!token.is_active());
        assert_eq!(center.subscriber_count(), 0);
    }

    #[test]
    fn cancel_suppresses_already_queued_delivery() {
        let center = center();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        // The first listener parks the lane until released.
        let _blocker = center.listen(tasks("f1"), move |_: Delivery<Ping>| {
            let _ = release_rx.lock().unwrap().recv();
        });
        let (seen, handler) = recorder::<Ping>();
        let token = center.listen(tasks("f1"), handler);

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        token.cancel();
        release_tx.send(()).unwrap();
        center.flush();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_is_idempotent_and_survives_center_drop() {
        let center = center();
        let (_seen, handler) = recorder::<Ping>();
        let token = center.listen(tasks("f1"), handler);
        let copy = token.clone();
        assert_eq!(token, copy);

        token.cancel();
        token.cancel();
        center.remove_listener(&copy);
        drop(center);
        copy.cancel();
        assert!(!copy.is_active());
    }

    // -----------------------------------------------------------------------
    // Failure isolation
    // -----------------------------------------------------------------------

    #[test]
    fn panicking_listener_is_removed_and_others_still_receive() {
        let center = center();
        let bad = center.listen(tasks("f1"), |_: Delivery<Ping>| panic!("handler bug"));
        let (seen, handler) = recorder::<Ping>();
        let _good = center.listen(tasks("f1"), handler);

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("b"))]);
        center.flush();

        assert!(!bad.is_active());
        assert_eq!(center.subscriber_count(), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn publish_error_reaches_listeners() {
        let center = center();
        let (seen, handler) = recorder::<Ping>();
        let _token = center.listen(tasks("f1"), handler);

        center.publish_error::<Ping>(&tasks("f1"), ListenerError::Corrupted("bad index".into()));
        center.flush();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], Err(ListenerError::Corrupted("bad index".into())));
    }

    // -----------------------------------------------------------------------
    // Replay and streams
    // -----------------------------------------------------------------------

    #[test]
    fn replay_goes_only_to_the_new_listener_and_comes_first() {
        let center = center();
        let (old, old_handler) = recorder::<Ping>();
        let _old = center.listen(tasks("f1"), old_handler);

        let (new, new_handler) = recorder::<Ping>();
        let _new = center.listen_with_replay(tasks("f1"), vec![ChangeEvent::Added(ping("existing"))], new_handler);
        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("live"))]);
        center.flush();

        let new = new.lock().unwrap();
        assert_eq!(new.len(), 2);
        assert_eq!(ids(&new[0]), ["existing"]);
        assert_eq!(ids(&new[1]), ["live"]);

        let old = old.lock().unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(ids(&old[0]), ["live"]);
    }

    #[tokio::test]
    async fn stream_yields_deliveries() {
        let center = center();
        let (token, mut rx) = center.stream::<Ping>(tasks("f1"));

        center.publish(&tasks("f1"), vec![ChangeEvent::Added(ping("a"))]);
        center.publish(&tasks("f1"), vec![ChangeEvent::Removed(ping("a"))]);

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first, vec![ChangeEvent::Added(ping("a"))]);
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second, vec![ChangeEvent::Removed(ping("a"))]);

        token.cancel();
        assert_eq!(center.subscriber_count(), 0);
    }

    #[test]
    fn debug_format() {
        let center = center();
        let debug = format!("{center:?}");
        assert!(debug.contains("subscriber_count"));
    }
}
