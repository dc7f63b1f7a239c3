//! Named-query registry and update service.
//!
//! Widgets look queries up by name, mutate them, and ask the registry to
//! update them. An update fetches the query's select url, stores the outcome
//! on the query and publishes the query's name on the event bus. The
//! notification fires on failure too; listeners check
//! [`Query::error_message`] to tell the two apart.
//!
//! Two updates of the same name may be in flight at once. Nothing orders
//! their completions, so whichever response arrives last is what the query
//! keeps, and neither request is cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use common::query_parser::parse_hash_into;
use common::search_query::{Query, apply_baseline_defaults};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::event_bus::{EventBus, Subscription};
use crate::transport::{HttpTransport, SearchTransport};

/// Strategy applied to every query the registry creates.
pub type DefaultQueryFn = Arc<dyn Fn(&mut Query) + Send + Sync>;

/// A registered query. Widgets holding the handle see updates in place.
pub type SharedQuery = Arc<Mutex<Query>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    NotFound,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Unregistered,
    Idle,
    Updating,
}

struct RegistryInner {
    queries: Mutex<HashMap<String, SharedQuery>>,
    in_flight: Mutex<HashMap<String, usize>>,
    default_query: RwLock<DefaultQueryFn>,
    events: EventBus,
    transport: Arc<dyn SearchTransport>,
}

#[derive(Clone)]
pub struct QueryRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("queries", &self.query_names())
            .field("events", &self.inner.events)
            .finish()
    }
}

impl QueryRegistry {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        let default_query: DefaultQueryFn = Arc::new(apply_baseline_defaults);
        Self {
            inner: Arc::new(RegistryInner {
                queries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                default_query: RwLock::new(default_query),
                events: EventBus::new(),
                transport,
            }),
        }
    }

    /// Registry over an http transport, with the config's default strategy.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        let registry = Self::new(Arc::new(transport));
        *registry.inner.default_query.write() = config.default_query_fn();
        Ok(registry)
    }

    /// Replaces the strategy used by later [`QueryRegistry::create_query`]
    /// calls. Queries created earlier are not touched.
    pub fn set_default_query(&self, default_query: impl Fn(&mut Query) + Send + Sync + 'static) {
        *self.inner.default_query.write() = Arc::new(default_query);
    }

    pub fn create_query(&self, base_url: &str) -> Query {
        let default_query = self.inner.default_query.read().clone();
        let mut query = Query::new(base_url);
        default_query(&mut query);
        query
    }

    pub fn get_query(&self, name: &str) -> Option<SharedQuery> {
        let query = self.inner.queries.lock().get(name).cloned();
        if query.is_none() {
            debug!("no query registered as {name:?}");
        }
        query
    }

    /// Stores `query` under `name`, replacing any previous entry, and returns
    /// the handle widgets should share.
    pub fn set_query(&self, name: impl Into<String>, query: Query) -> SharedQuery {
        let shared = Arc::new(Mutex::new(query));
        self.inner.queries.lock().insert(name.into(), shared.clone());
        shared
    }

    pub fn remove_query(&self, name: &str) -> Option<SharedQuery> {
        self.inner.queries.lock().remove(name)
    }

    pub fn query_names(&self) -> Vec<String> {
        let mut names = self.inner.queries.lock().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Parses `hash` on top of this registry's default query.
    pub fn get_query_from_hash(&self, hash: &str, base_url: &str) -> Query {
        parse_hash_into(hash, self.create_query(base_url))
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Calls `listener` every time the query named `name` finishes updating.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, name: impl Into<String>, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.inner.events.subscribe(name, listener)
    }

    pub fn query_state(&self, name: &str) -> QueryState {
        if !self.inner.queries.lock().contains_key(name) {
            return QueryState::Unregistered;
        }
        match self.inner.in_flight.lock().get(name) {
            Some(count) if *count > 0 => QueryState::Updating,
            _ => QueryState::Idle,
        }
    }

    /// Fetches results for the query named `name`, stores them on the query
    /// and notifies the name's subscribers. Fetch failures are recorded on
    /// the query rather than returned.
    pub async fn update_query(&self, name: &str) -> UpdateStatus {
        let Some(query) = self.inner.queries.lock().get(name).cloned() else {
            warn!("update requested for unknown query {name:?}");
            return UpdateStatus::NotFound;
        };
        let url = query.lock().solr_query_url();

        let in_flight = InFlight::enter(&self.inner, name);
        let result = self.inner.transport.fetch(&url).await;
        let status = match result {
            Ok(envelope) => {
                info!("query {name:?} updated: {} hits", envelope.response.num_found);
                query.lock().record_success(envelope);
                UpdateStatus::Succeeded
            }
            Err(err) => {
                warn!("query {name:?} failed: {err:#}");
                query.lock().record_failure(format!("{err:#}"));
                UpdateStatus::Failed
            }
        };
        drop(in_flight);

        self.inner.events.publish(name);
        status
    }

    /// Starts an independent update for every registered query. Must be
    /// called inside a tokio runtime; the handles may be ignored.
    pub fn update_all_queries(&self) -> Vec<JoinHandle<UpdateStatus>> {
        self.query_names()
            .into_iter()
            .map(|name| {
                let registry = self.clone();
                tokio::spawn(async move { registry.update_query(&name).await })
            })
            .collect()
    }

    /// Updates `names` one after another; each request is issued only after
    /// the previous one finished, whatever its outcome.
    pub async fn update_queries_in_order<I, S>(&self, names: I) -> Vec<UpdateStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut statuses = Vec::new();
        for name in names {
            statuses.push(self.update_query(name.as_ref()).await);
        }
        statuses
    }

    /// Navigation entry point: rebuilds the query from `hash`, registers it
    /// as `name` and updates it.
    pub async fn apply_location_hash(&self, name: &str, hash: &str, base_url: &str) -> UpdateStatus {
        let query = self.get_query_from_hash(hash, base_url);
        self.set_query(name, query);
        self.update_query(name).await
    }
}

/// Marks a name as updating for as long as it lives.
struct InFlight<'a> {
    inner: &'a RegistryInner,
    name: String,
}

impl<'a> InFlight<'a> {
    fn enter(inner: &'a RegistryInner, name: &str) -> Self {
        *inner.in_flight.lock().entry(name.to_string()).or_default() += 1;
        Self { inner, name: name.to_string() }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(count) = in_flight.get_mut(&self.name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                in_flight.remove(&self.name);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::facet::Facet;
    use common::search_result::{ResultSet, SearchResponse};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const CORE: &str = "http://host/solr";

    fn envelope(num_found: u64) -> SearchResponse {
        serde_json::from_value(serde_json::json!({
            "responseHeader": {"status": 0, "QTime": 2},
            "response": {"numFound": num_found, "start": 0, "docs": [{"id": "doc-1"}]},
            "highlighting": {"doc-1": {"title": ["<em>dog</em>"]}},
            "facet_counts": {"facet_fields": {"type": ["Person", 1]}}
        }))
        .unwrap()
    }

    /// Answers every url with `envelope(7)`, except urls containing "fail".
    #[derive(Default)]
    struct FakeTransport {
        urls: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl SearchTransport for FakeTransport {
        async fn fetch(&self, url: &str) -> anyhow::Result<SearchResponse> {
            self.urls.lock().push(url.to_string());
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if url.contains("fail") {
                anyhow::bail!("connection refused");
            }
            Ok(envelope(7))
        }
    }

    /// Blocks each fetch until released.
    #[derive(Default)]
    struct GatedTransport {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SearchTransport for GatedTransport {
        async fn fetch(&self, _url: &str) -> anyhow::Result<SearchResponse> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(envelope(1))
        }
    }

    fn counting_listener(registry: &QueryRegistry, name: &str) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = registry.subscribe(name, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    fn registry_with(transport: Arc<FakeTransport>) -> QueryRegistry {
        QueryRegistry::new(transport)
    }

    #[test]
    fn create_query_applies_default_strategy() {
        let registry = registry_with(Arc::default());
        let query = registry.create_query(CORE);
        assert_eq!(query.to_query_string(), "q=*:*&fl=*&rows=10&wt=json");

        registry.set_default_query(|query: &mut Query| {
            apply_baseline_defaults(query);
            query.add_facet(Facet::new("location", "[* TO *]"));
        });
        let query = registry.create_query(CORE);
        assert!(query.has_facet("location"));

        let parsed = registry.get_query_from_hash("q=dog", CORE);
        assert_eq!(parsed.user_query(), "dog");
        assert!(parsed.has_facet("location"));
        assert_eq!(parsed.option("rows"), Some("10"));
    }

    #[test]
    fn set_and_get_share_one_handle() {
        let registry = registry_with(Arc::default());
        assert!(registry.get_query("results").is_none());
        assert_eq!(registry.query_state("results"), QueryState::Unregistered);

        let handle = registry.set_query("results", registry.create_query(CORE));
        handle.lock().set_user_query("dog");
        let fetched = registry.get_query("results").unwrap();
        assert_eq!(fetched.lock().user_query(), "dog");
        assert_eq!(registry.query_state("results"), QueryState::Idle);

        registry.set_query("results", registry.create_query(CORE));
        assert_eq!(registry.get_query("results").unwrap().lock().user_query(), "*:*");
        assert_eq!(registry.query_names(), vec!["results".to_string()]);

        assert!(registry.remove_query("results").is_some());
        assert_eq!(registry.query_state("results"), QueryState::Unregistered);
    }

    #[tokio::test]
    async fn successful_update_stores_envelope_and_notifies_once() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport.clone());
        let handle = registry.set_query("results", registry.create_query(CORE));
        handle.lock().set_error_message(Some("old".into()));
        let (count, _sub) = counting_listener(&registry, "results");

        assert_eq!(registry.update_query("results").await, UpdateStatus::Succeeded);

        let query = handle.lock();
        assert_eq!(query.response().num_found, 7);
        assert_eq!(query.response_header().unwrap().q_time, 2);
        assert!(query.highlighting().unwrap().contains_key("doc-1"));
        assert_eq!(query.facet_counts().unwrap().field_values("type").len(), 1);
        assert_eq!(query.error_message(), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(*transport.urls.lock(), vec![query.solr_query_url()]);
    }

    #[tokio::test]
    async fn failed_update_resets_results_and_still_notifies() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport);
        let handle = registry.set_query("results", registry.create_query(CORE));
        let (count, _sub) = counting_listener(&registry, "results");

        registry.update_query("results").await;
        assert_eq!(handle.lock().response().num_found, 7);

        handle.lock().set_user_query("fail");
        assert_eq!(registry.update_query("results").await, UpdateStatus::Failed);

        let query = handle.lock();
        assert_eq!(query.response().num_found, 0);
        assert!(query.response().docs.is_empty());
        assert_eq!(query.response(), &ResultSet::empty());
        assert!(query.facet_counts().is_none());
        assert!(query.highlighting().is_none());
        assert!(query.response_header().is_none());
        assert!(query.error_message().unwrap().contains("connection refused"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(query);

        assert_eq!(registry.query_state("results"), QueryState::Idle);
    }

    #[tokio::test]
    async fn unknown_name_is_a_logged_no_op() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport.clone());
        let (count, _sub) = counting_listener(&registry, "ghost");

        assert_eq!(registry.update_query("ghost").await, UpdateStatus::NotFound);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(transport.urls.lock().is_empty());
    }

    #[tokio::test]
    async fn updates_in_order_run_one_at_a_time() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport.clone());
        for (name, user_query) in [("a", "alpha"), ("b", "fail"), ("c", "gamma")] {
            let mut query = registry.create_query(CORE);
            query.set_user_query(user_query);
            registry.set_query(name, query);
        }

        let statuses = registry.update_queries_in_order(["c", "b", "missing", "a"]).await;
        assert_eq!(
            statuses,
            vec![
                UpdateStatus::Succeeded,
                UpdateStatus::Failed,
                UpdateStatus::NotFound,
                UpdateStatus::Succeeded,
            ]
        );
        let urls = transport.urls.lock();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].contains("q=gamma"));
        assert!(urls[1].contains("q=fail"));
        assert!(urls[2].contains("q=alpha"));
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_all_touches_every_query() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport.clone());
        registry.set_query("results", registry.create_query(CORE));
        registry.set_query("map", registry.create_query(CORE));
        let (results, _a) = counting_listener(&registry, "results");
        let (map, _b) = counting_listener(&registry, "map");

        let handles = registry.update_all_queries();
        assert_eq!(handles.len(), 2);
        for status in futures::future::join_all(handles).await {
            assert_eq!(status.unwrap(), UpdateStatus::Succeeded);
        }
        assert_eq!(results.load(Ordering::SeqCst), 1);
        assert_eq!(map.load(Ordering::SeqCst), 1);
        assert_eq!(transport.urls.lock().len(), 2);
    }

    #[tokio::test]
    async fn state_is_updating_while_request_is_in_flight() {
        let transport = Arc::new(GatedTransport::default());
        let registry = QueryRegistry::new(transport.clone());
        registry.set_query("results", registry.create_query(CORE));

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.update_query("results").await })
        };
        transport.started.notified().await;
        assert_eq!(registry.query_state("results"), QueryState::Updating);

        transport.release.notify_one();
        assert_eq!(task.await.unwrap(), UpdateStatus::Succeeded);
        assert_eq!(registry.query_state("results"), QueryState::Idle);
    }

    #[tokio::test]
    async fn replaced_query_is_not_touched_by_stale_response() {
        let transport = Arc::new(GatedTransport::default());
        let registry = QueryRegistry::new(transport.clone());
        let original = registry.set_query("results", registry.create_query(CORE));

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.update_query("results").await })
        };
        transport.started.notified().await;
        let replacement = registry.set_query("results", registry.create_query(CORE));
        transport.release.notify_one();
        task.await.unwrap();

        assert_eq!(original.lock().response().num_found, 1);
        assert_eq!(replacement.lock().response().num_found, 0);
    }

    #[tokio::test]
    async fn location_hash_registers_and_updates() {
        let transport = Arc::new(FakeTransport::default());
        let registry = registry_with(transport.clone());
        let (count, _sub) = counting_listener(&registry, "results");

        let status = registry
            .apply_location_hash("results", "#/q=dog +type:x&fq=place:Melbourne&rows=5", CORE)
            .await;
        assert_eq!(status, UpdateStatus::Succeeded);

        let query = registry.get_query("results").unwrap();
        let query = query.lock();
        assert_eq!(query.user_query(), "dog");
        assert_eq!(query.user_query_parameters(), ["+type:x"]);
        assert!(query.has_facet("place"));
        assert_eq!(query.option("rows"), Some("5"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
