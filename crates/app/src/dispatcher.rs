//! Dispatcher: the live route table and request dispatch.
//!
//! Readers take one atomic load of the current [`RouteTable`], clone the
//! matched route and release the snapshot before the handler runs. Writers
//! serialize on one lock, build a new table off to the side and publish it
//! with a single swap, so a dispatch sees either the whole old table or the
//! whole new one.

mod params;
mod table;

pub use params::{coerce, merge};
pub use table::{RouteInfo, RouteKey, RouteRecord, RouteTable};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use council_domain::automation::{
    Automation, Endpoint, EndpointKey, HttpMethod, PathTemplate, join_path,
};
use council_domain::error::ValidationError;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::builtin::HealthHandler;
use crate::handler::{HandlerError, HandlerOutput, Params};
use crate::memory::MemoryRepository;
use crate::ports::{BackendStatus, RecordRepository, StorageError};
use crate::resolver::{BoundHandler, HandlerResolver, ResolutionError};
use crate::storage::StorageFactory;
use table::Registration;

/// Path of the health route every registered automation gets.
pub const HEALTH_PATH: &str = "/health";

/// Why a route could not be registered.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {method} {path} is already served by automation {owner:?}")]
    Conflict {
        method: HttpMethod,
        path: String,
        owner: String,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Path(#[from] ValidationError),

    #[error("storage for automation is not available")]
    Storage(#[from] StorageError),
}

/// One endpoint that did not make it into the table.
#[derive(Debug)]
pub struct FailedEndpoint {
    pub method: HttpMethod,
    pub path: String,
    pub error: RouteError,
}

/// Outcome of registering one automation.
#[derive(Debug)]
pub struct RegistrationReport {
    pub automation: String,
    pub registered: Vec<EndpointKey>,
    pub failed: Vec<FailedEndpoint>,
    pub storage: BackendStatus,
}

impl RegistrationReport {
    fn new(automation: &str, storage: BackendStatus) -> Self {
        Self {
            automation: automation.to_string(),
            registered: Vec::new(),
            failed: Vec::new(),
            storage,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of [`Dispatcher::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed { routes: usize },
    NotRegistered,
}

/// An incoming request, already split into its parts.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Params,
    pub body: Option<Value>,
}

impl DispatchRequest {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A shaped, successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: Value,
    pub storage: BackendStatus,
    pub automation: String,
}

/// Failures of [`Dispatcher::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    RouteNotFound { method: HttpMethod, path: String },

    #[error("parameter validation failed: {0}")]
    ParameterValidation(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Owner of the live route table.
pub struct Dispatcher {
    table: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
    resolver: HandlerResolver,
    storage: Arc<StorageFactory>,
}

impl Dispatcher {
    pub fn new(resolver: HandlerResolver, storage: Arc<StorageFactory>) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            write_lock: Mutex::new(()),
            resolver,
            storage,
        }
    }

    /// The currently published table.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.table.load().routes()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.table.load().is_registered(name)
    }

    /// Register every active automation. One failing never stops the others.
    pub async fn register_all(
        &self,
        automations: &[Automation],
    ) -> Vec<(String, Result<RegistrationReport, RouteError>)> {
        let mut results = Vec::new();
        for automation in automations.iter().filter(|a| a.is_active()) {
            let result = self.register(automation).await;
            results.push((automation.name.clone(), result));
        }
        results
    }

    /// Replace every route of `automation` with freshly bound ones.
    ///
    /// Endpoints that fail to bind are reported and left out; the rest go live.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Storage`] when the storage binding cannot be
    /// resolved at all. The previous routes stay live in that case.
    #[tracing::instrument(skip(self, automation), fields(automation = %automation.name))]
    pub async fn register(&self, automation: &Automation) -> Result<RegistrationReport, RouteError> {
        let _guard = self.write_lock.lock().await;
        let current = self.table.load_full();
        self.register_locked(&current, automation).await
    }

    async fn register_locked(
        &self,
        current: &RouteTable,
        automation: &Automation,
    ) -> Result<RegistrationReport, RouteError> {
        let records = self
            .storage_for(automation, current.registration(&automation.name))
            .await?;
        let snapshot = Arc::new(automation.clone());
        let mut table = current.clone();
        table.remove_automation(&automation.name);
        table.set_registration(
            &automation.name,
            Registration {
                automation: Arc::clone(&snapshot),
                records: Arc::clone(&records),
                keys: BTreeSet::new(),
            },
        );

        let mut report = RegistrationReport::new(&automation.name, records.status());
        for endpoint in automation.endpoints.iter().filter(|e| e.active) {
            self.bind(&mut table, &snapshot, endpoint, &records, &mut report);
        }
        self.ensure_health(&mut table, &snapshot, &records);
        table.reindex();
        self.table.store(Arc::new(table));
        log_report(&report);
        Ok(report)
    }

    /// Re-register only what changed since the last registration.
    ///
    /// Falls back to [`register`](Self::register) when the automation is not
    /// registered yet or its base path or storage binding changed.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    #[tracing::instrument(skip(self, automation), fields(automation = %automation.name))]
    pub async fn update(&self, automation: &Automation) -> Result<RegistrationReport, RouteError> {
        let _guard = self.write_lock.lock().await;
        let current = self.table.load_full();
        let Some(registration) = current.registration(&automation.name) else {
            return self.register_locked(&current, automation).await;
        };
        let previous = Arc::clone(&registration.automation);
        if previous.base_path != automation.base_path
            || previous.storage_binding != automation.storage_binding
        {
            return self.register_locked(&current, automation).await;
        }
        let records = Arc::clone(&registration.records);

        let active = |a: &Automation| -> BTreeMap<EndpointKey, Endpoint> {
            a.endpoints
                .iter()
                .filter(|e| e.active)
                .map(|e| (e.key(), e.clone()))
                .collect()
        };
        let before = active(&previous);
        let after = active(automation);

        let snapshot = Arc::new(automation.clone());
        let mut table = (*current).clone();
        if let Some(registration) = table.registration_mut(&automation.name) {
            registration.automation = Arc::clone(&snapshot);
        }
        let mut report = RegistrationReport::new(&automation.name, records.status());

        let route_key = |key: &EndpointKey| (key.method, join_path(&automation.base_path, &key.path));
        for key in before.keys().filter(|k| !after.contains_key(*k)) {
            table.remove_owned(&route_key(key), &automation.name);
        }
        for (key, endpoint) in &after {
            if before.get(key) == Some(endpoint) {
                continue;
            }
            table.remove_owned(&route_key(key), &automation.name);
            self.bind(&mut table, &snapshot, endpoint, &records, &mut report);
        }
        self.ensure_health(&mut table, &snapshot, &records);
        table.reindex();
        self.table.store(Arc::new(table));
        log_report(&report);
        Ok(report)
    }

    /// Drop every route of `name`. Calling it twice is harmless.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> RemovalOutcome {
        let _guard = self.write_lock.lock().await;
        let current = self.table.load_full();
        if !current.is_registered(name) {
            return RemovalOutcome::NotRegistered;
        }
        let mut table = (*current).clone();
        let routes = table.remove_automation(name).unwrap_or_default();
        table.reindex();
        self.table.store(Arc::new(table));
        tracing::info!(routes, "automation routes removed");
        RemovalOutcome::Removed { routes }
    }

    /// Serve one request from the live table.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RouteNotFound`] when nothing matches,
    /// [`DispatchError::ParameterValidation`] when declared parameters are
    /// missing or malformed, and [`DispatchError::Handler`] when the handler fails.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        let found = self.table.load().lookup(request.method, &request.path);
        let Some((route, path_params)) = found else {
            return Err(DispatchError::RouteNotFound {
                method: request.method,
                path: request.path,
            });
        };

        let endpoint = Arc::clone(route.handler.endpoint());
        let params = merge(request.query, request.body, path_params);
        let params = coerce(&endpoint, params).map_err(DispatchError::ParameterValidation)?;

        let handler = route.handler.clone();
        let output = tokio::spawn(async move { handler.invoke(params).await })
            .await
            .map_err(|err| HandlerError::Failed(err.to_string()))??;

        Ok(DispatchResponse {
            status: if request.method == HttpMethod::Post { 201 } else { 200 },
            body: shape(&endpoint, output),
            storage: route.storage,
            automation: route.owner().to_string(),
        })
    }

    fn bind(
        &self,
        table: &mut RouteTable,
        automation: &Arc<Automation>,
        endpoint: &Endpoint,
        records: &Arc<dyn RecordRepository>,
        report: &mut RegistrationReport,
    ) {
        let key = endpoint.key();
        match self.route_for(table, automation, endpoint.clone(), records, false) {
            Ok(route) => {
                table.insert(route);
                report.registered.push(key);
            }
            Err(error) => report.failed.push(FailedEndpoint {
                method: key.method,
                path: key.path,
                error,
            }),
        }
    }

    fn route_for(
        &self,
        table: &RouteTable,
        automation: &Arc<Automation>,
        endpoint: Endpoint,
        records: &Arc<dyn RecordRepository>,
        builtin: bool,
    ) -> Result<RouteRecord, RouteError> {
        let path = automation.route_path(&endpoint);
        let method = endpoint.method;
        if let Some(existing) = table.get(&(method, path.clone()))
            && existing.owner() != automation.name
        {
            return Err(RouteError::Conflict {
                method,
                path,
                owner: existing.owner().to_string(),
            });
        }
        let template = PathTemplate::parse(&path)?;
        let handler = if builtin {
            BoundHandler::new(
                "builtin.health",
                Arc::clone(automation),
                endpoint,
                Arc::new(HealthHandler::new(records.status())),
            )
        } else {
            self.resolver.resolve(automation, endpoint, records)?
        };
        Ok(RouteRecord {
            method,
            path,
            template,
            handler,
            storage: records.status(),
            builtin,
        })
    }

    fn ensure_health(
        &self,
        table: &mut RouteTable,
        automation: &Arc<Automation>,
        records: &Arc<dyn RecordRepository>,
    ) {
        let key = (HttpMethod::Get, join_path(&automation.base_path, HEALTH_PATH));
        if table.get(&key).is_some() {
            return;
        }
        let endpoint = Endpoint::new(HttpMethod::Get, HEALTH_PATH).summary("Automation health");
        match self.route_for(table, automation, endpoint, records, true) {
            Ok(route) => table.insert(route),
            Err(error) => tracing::debug!(%error, "health route not registered"),
        }
    }

    async fn storage_for(
        &self,
        automation: &Automation,
        previous: Option<&Registration>,
    ) -> Result<Arc<dyn RecordRepository>, StorageError> {
        match self.storage.resolve(&automation.storage_binding).await {
            Ok(records) => Ok(records),
            Err(err @ StorageError::BackendUnavailable { .. }) => {
                tracing::warn!(
                    automation = %automation.name,
                    backend = %automation.storage_binding.backend,
                    error = %err,
                    "storage backend unavailable, serving from in-memory fallback"
                );
                let fallback = previous.filter(|r| {
                    r.records.status() == BackendStatus::Degraded
                        && r.automation.storage_binding == automation.storage_binding
                });
                Ok(fallback.map_or_else(
                    || Arc::new(MemoryRepository::degraded()) as Arc<dyn RecordRepository>,
                    |r| Arc::clone(&r.records),
                ))
            }
            Err(err) => Err(err),
        }
    }
}

fn shape(endpoint: &Endpoint, output: HandlerOutput) -> Value {
    match (endpoint.wrap_response, output) {
        (true, HandlerOutput::Collection { items, total }) => json!({"items": items, "total": total}),
        (false, HandlerOutput::Collection { items, .. }) => Value::Array(items),
        (true, HandlerOutput::Single(value)) => json!({"data": value}),
        (false, HandlerOutput::Single(value)) => value,
    }
}

fn log_report(report: &RegistrationReport) {
    for failure in &report.failed {
        tracing::warn!(
            method = %failure.method,
            path = %failure.path,
            error = %failure.error,
            "endpoint not registered"
        );
    }
    tracing::info!(
        registered = report.registered.len(),
        failed = report.failed.len(),
        storage = report.storage.as_str(),
        "automation routes registered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::EchoHandler;
    use crate::memory::MemoryConnector;
    use crate::ports::{BackendConnection, BackendConnector};
    use async_trait::async_trait;
    use council_domain::automation::{
        AutomationStatus, EndpointParameter, ParamType, StorageBinding, default_crud_endpoints,
    };

    struct Unreachable;

    #[async_trait]
    impl BackendConnector for Unreachable {
        async fn connect(&self, _config: &Value) -> Result<Arc<dyn BackendConnection>, StorageError> {
            Err(StorageError::unavailable(
                "relational",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            ))
        }
    }

    fn make_dispatcher() -> Dispatcher {
        let storage = StorageFactory::new()
            .with_connector("memory", MemoryConnector)
            .with_connector("relational", Unreachable);
        Dispatcher::new(
            HandlerResolver::new().with_handler("echo", EchoHandler),
            Arc::new(storage),
        )
    }

    fn active(name: &str, endpoints: Vec<Endpoint>) -> Automation {
        let mut builder = Automation::builder()
            .name(name)
            .status(AutomationStatus::Active);
        for endpoint in endpoints {
            builder = builder.endpoint(endpoint);
        }
        builder.build().unwrap()
    }

    fn echo(method: HttpMethod, path: &str) -> Endpoint {
        Endpoint::new(method, path).handler("echo")
    }

    #[tokio::test]
    async fn should_serve_crud_endpoints_with_shaping() {
        let dispatcher = make_dispatcher();
        dispatcher
            .register(&active("orders", default_crud_endpoints()))
            .await
            .unwrap();

        let created = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Post, "/api/orders").body(json!({"item": "book"})))
            .await
            .unwrap();
        assert_eq!(created.status, 201);
        let id = created.body["id"].as_str().unwrap().to_string();

        let listed = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/"))
            .await
            .unwrap();
        assert_eq!(listed.status, 200);
        assert_eq!(listed.body["total"], json!(1));
        assert_eq!(listed.body["items"][0]["item"], json!("book"));

        let fetched = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, format!("/api/orders/{id}")))
            .await
            .unwrap();
        assert_eq!(fetched.body["data"]["id"], json!(id));
        assert_eq!(fetched.storage, BackendStatus::Durable);
    }

    #[tokio::test]
    async fn should_return_bare_array_when_not_wrapped() {
        let dispatcher = make_dispatcher();
        dispatcher
            .register(&active("orders", vec![Endpoint::new(HttpMethod::Get, "/")]))
            .await
            .unwrap();
        let listed = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders"))
            .await
            .unwrap();
        assert_eq!(listed.body, json!([]));
    }

    #[tokio::test]
    async fn should_prefer_literal_route_over_template() {
        let dispatcher = make_dispatcher();
        dispatcher
            .register(&active(
                "orders",
                vec![echo(HttpMethod::Get, "/{id}"), echo(HttpMethod::Get, "/summary")],
            ))
            .await
            .unwrap();
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/summary"))
            .await
            .unwrap();
        assert_eq!(response.body["path"], json!("/summary"));
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/42"))
            .await
            .unwrap();
        assert_eq!(response.body["path"], json!("/{id}"));
        assert_eq!(response.body["params"]["id"], json!("42"));
    }

    #[tokio::test]
    async fn should_rank_templates_by_literal_segments() {
        let dispatcher = make_dispatcher();
        dispatcher
            .register(&active(
                "orders",
                vec![echo(HttpMethod::Get, "/{a}/{b}"), echo(HttpMethod::Get, "/{a}/items")],
            ))
            .await
            .unwrap();
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/7/items"))
            .await
            .unwrap();
        assert_eq!(response.body["path"], json!("/{a}/items"));
    }

    #[tokio::test]
    async fn should_fail_with_route_not_found() {
        let dispatcher = make_dispatcher();
        let err = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/nothing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RouteNotFound { .. }));
    }

    #[tokio::test]
    async fn should_validate_declared_parameters() {
        let dispatcher = make_dispatcher();
        let endpoint = echo(HttpMethod::Get, "/search")
            .param(EndpointParameter::required("n", ParamType::Integer));
        dispatcher
            .register(&active("orders", vec![endpoint]))
            .await
            .unwrap();

        let err = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/search").query("n", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ParameterValidation(_)));

        let ok = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/search").query("n", "5"))
            .await
            .unwrap();
        assert_eq!(ok.body["params"]["n"], json!(5));
    }

    #[tokio::test]
    async fn should_register_other_endpoints_when_one_fails() {
        let dispatcher = make_dispatcher();
        let automation = active(
            "orders",
            vec![
                echo(HttpMethod::Get, "/ok"),
                Endpoint::new(HttpMethod::Get, "/broken").handler("no.such.handler"),
            ],
        );
        let report = dispatcher.register(&automation).await.unwrap();
        assert_eq!(report.registered.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].error,
            RouteError::Resolution(ResolutionError::HandlerNotFound(_))
        ));
        assert!(
            dispatcher
                .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/ok"))
                .await
                .is_ok()
        );
        assert!(
            dispatcher
                .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/broken"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_refuse_route_owned_by_other_automation() {
        let dispatcher = make_dispatcher();
        let first = Automation::builder()
            .name("first")
            .base_path("/shared")
            .status(AutomationStatus::Active)
            .endpoint(echo(HttpMethod::Get, "/x"))
            .build()
            .unwrap();
        let second = Automation::builder()
            .name("second")
            .base_path("/shared")
            .status(AutomationStatus::Active)
            .endpoint(echo(HttpMethod::Get, "/x"))
            .endpoint(echo(HttpMethod::Get, "/y"))
            .build()
            .unwrap();
        dispatcher.register(&first).await.unwrap();
        let report = dispatcher.register(&second).await.unwrap();
        assert_eq!(report.registered.len(), 1);
        assert!(matches!(
            &report.failed[0].error,
            RouteError::Conflict { owner, .. } if owner == "first"
        ));
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/shared/x"))
            .await
            .unwrap();
        assert_eq!(response.automation, "first");
    }

    #[tokio::test]
    async fn should_keep_foreign_route_when_loser_edits_or_removes_it() {
        let dispatcher = make_dispatcher();
        let first = Automation::builder()
            .name("first")
            .base_path("/shared")
            .status(AutomationStatus::Active)
            .endpoint(echo(HttpMethod::Get, "/x"))
            .build()
            .unwrap();
        let mut second = Automation::builder()
            .name("second")
            .base_path("/shared")
            .status(AutomationStatus::Active)
            .endpoint(echo(HttpMethod::Get, "/x"))
            .build()
            .unwrap();
        dispatcher.register(&first).await.unwrap();
        dispatcher.register(&second).await.unwrap();

        second.endpoints[0] = echo(HttpMethod::Get, "/x").summary("changed");
        let report = dispatcher.update(&second).await.unwrap();
        assert!(matches!(
            &report.failed[0].error,
            RouteError::Conflict { owner, .. } if owner == "first"
        ));
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/shared/x"))
            .await
            .unwrap();
        assert_eq!(response.automation, "first");

        second.endpoints.clear();
        dispatcher.update(&second).await.unwrap();
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/shared/x"))
            .await
            .unwrap();
        assert_eq!(response.automation, "first");
        assert_eq!(dispatcher.remove("first").await, RemovalOutcome::Removed { routes: 2 });
    }

    #[tokio::test]
    async fn should_remove_routes_idempotently() {
        let dispatcher = make_dispatcher();
        dispatcher
            .register(&active("orders", vec![echo(HttpMethod::Get, "/a"), echo(HttpMethod::Get, "/b")]))
            .await
            .unwrap();
        // two declared routes plus health
        assert_eq!(
            dispatcher.remove("orders").await,
            RemovalOutcome::Removed { routes: 3 }
        );
        assert_eq!(dispatcher.remove("orders").await, RemovalOutcome::NotRegistered);
        assert!(dispatcher.snapshot().is_empty());
    }

    #[tokio::test]
    async fn should_apply_incremental_update() {
        let dispatcher = make_dispatcher();
        let mut automation = active("orders", vec![echo(HttpMethod::Get, "/a"), echo(HttpMethod::Get, "/b")]);
        dispatcher.register(&automation).await.unwrap();
        let untouched = dispatcher
            .snapshot()
            .get(&(HttpMethod::Get, "/api/orders/a".to_string()))
            .cloned()
            .unwrap();

        automation.remove_endpoint("/b", HttpMethod::Get);
        automation.add_endpoint(echo(HttpMethod::Post, "/c")).unwrap();
        let report = dispatcher.update(&automation).await.unwrap();
        assert_eq!(report.registered.len(), 1);

        let table = dispatcher.snapshot();
        let still = table.get(&(HttpMethod::Get, "/api/orders/a".to_string())).unwrap();
        assert!(Arc::ptr_eq(&untouched, still));
        assert!(table.get(&(HttpMethod::Get, "/api/orders/b".to_string())).is_none());
        assert!(table.get(&(HttpMethod::Post, "/api/orders/c".to_string())).is_some());
    }

    #[tokio::test]
    async fn should_move_routes_when_base_path_changes() {
        let dispatcher = make_dispatcher();
        let mut automation = active("orders", vec![echo(HttpMethod::Get, "/a")]);
        dispatcher.register(&automation).await.unwrap();
        automation.base_path = "/v2/orders".to_string();
        dispatcher.update(&automation).await.unwrap();
        assert!(
            dispatcher
                .dispatch(DispatchRequest::new(HttpMethod::Get, "/v2/orders/a"))
                .await
                .is_ok()
        );
        assert!(
            dispatcher
                .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/a"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_serve_builtin_health_route() {
        let dispatcher = make_dispatcher();
        dispatcher.register(&active("orders", vec![])).await.unwrap();
        let response = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders/health"))
            .await
            .unwrap();
        assert_eq!(
            response.body,
            json!({"service": "orders", "status": "healthy", "storage": "durable"})
        );
    }

    #[tokio::test]
    async fn should_fall_back_to_degraded_memory_when_backend_unavailable() {
        let dispatcher = make_dispatcher();
        let automation = Automation::builder()
            .name("orders")
            .status(AutomationStatus::Active)
            .storage_binding(StorageBinding::new("relational", json!({"url": "sqlite://x"}), "orders"))
            .endpoint(Endpoint::new(HttpMethod::Post, "/"))
            .endpoint(Endpoint::new(HttpMethod::Get, "/").wrapped(true))
            .build()
            .unwrap();
        let report = dispatcher.register(&automation).await.unwrap();
        assert_eq!(report.storage, BackendStatus::Degraded);

        let created = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Post, "/api/orders").body(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(created.storage, BackendStatus::Degraded);

        // the fallback survives re-registration
        dispatcher.register(&automation).await.unwrap();
        let listed = dispatcher
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/api/orders"))
            .await
            .unwrap();
        assert_eq!(listed.body["total"], json!(1));
    }

    #[tokio::test]
    async fn should_fail_registration_for_unsupported_backend() {
        let dispatcher = make_dispatcher();
        let automation = Automation::builder()
            .name("orders")
            .status(AutomationStatus::Active)
            .storage_binding(StorageBinding::new("search", json!({}), "orders"))
            .build()
            .unwrap();
        let err = dispatcher.register(&automation).await.unwrap_err();
        assert!(matches!(err, RouteError::Storage(StorageError::UnsupportedBackend(_))));
        assert!(!dispatcher.is_registered("orders"));
    }

    #[tokio::test]
    async fn should_skip_inactive_automations_and_endpoints() {
        let dispatcher = make_dispatcher();
        let draft = Automation::builder()
            .name("draft")
            .endpoint(echo(HttpMethod::Get, "/x"))
            .build()
            .unwrap();
        let live = active(
            "live",
            vec![echo(HttpMethod::Get, "/on"), echo(HttpMethod::Get, "/off").active(false)],
        );
        let results = dispatcher.register_all(&[draft, live]).await;
        assert_eq!(results.len(), 1);
        assert!(!dispatcher.is_registered("draft"));
        let paths: Vec<_> = dispatcher.routes().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/api/live/health", "/api/live/on"]);
    }

    #[tokio::test]
    async fn should_bind_many_endpoints_independently() {
        let dispatcher = make_dispatcher();
        let mut automations = Vec::new();
        for a in 0..10 {
            let endpoints = (0..5).map(|e| echo(HttpMethod::Get, &format!("/e{e}"))).collect();
            automations.push(active(&format!("auto{a}"), endpoints));
        }
        for (_, result) in dispatcher.register_all(&automations).await {
            assert!(result.unwrap().is_complete());
        }
        for a in 0..10 {
            for e in 0..5 {
                let response = dispatcher
                    .dispatch(DispatchRequest::new(HttpMethod::Get, format!("/api/auto{a}/e{e}")))
                    .await
                    .unwrap();
                assert_eq!(response.body["automation"], json!(format!("auto{a}")));
                assert_eq!(response.body["path"], json!(format!("/e{e}")));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_never_dispatch_to_wrong_automation_during_updates() {
        let dispatcher = Arc::new(make_dispatcher());
        let mut automations = Vec::new();
        for a in 0..4 {
            let automation = active(&format!("auto{a}"), vec![echo(HttpMethod::Get, "/stable")]);
            dispatcher.register(&automation).await.unwrap();
            automations.push(automation);
        }

        let mut writers = Vec::new();
        for mut automation in automations {
            let dispatcher = Arc::clone(&dispatcher);
            writers.push(tokio::spawn(async move {
                for i in 0..25 {
                    let path = format!("/v{i}");
                    automation.add_endpoint(echo(HttpMethod::Get, &path)).unwrap();
                    dispatcher.update(&automation).await.unwrap();
                }
            }));
        }
        let mut readers = Vec::new();
        for r in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            readers.push(tokio::spawn(async move {
                for i in 0..100 {
                    let a = (r + i) % 4;
                    let response = dispatcher
                        .dispatch(DispatchRequest::new(HttpMethod::Get, format!("/api/auto{a}/stable")))
                        .await
                        .unwrap();
                    assert_eq!(response.body["automation"], json!(format!("auto{a}")));
                    assert_eq!(response.automation, format!("auto{a}"));
                }
            }));
        }
        for task in writers.into_iter().chain(readers) {
            task.await.unwrap();
        }
        for a in 0..4 {
            let response = dispatcher
                .dispatch(DispatchRequest::new(HttpMethod::Get, format!("/api/auto{a}/v24")))
                .await
                .unwrap();
            assert_eq!(response.body["automation"], json!(format!("auto{a}")));
        }
    }
}
