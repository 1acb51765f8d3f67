//! Automation registry: validated, indexed view over the definition store.
//!
//! Reads are served from an in-memory index. Every mutation validates first,
//! writes the document through the [`DefinitionStore`], and only then updates
//! the index, so a failed write never leaves the index ahead of the store.
//! Mutations of one automation are serialized by a per-name lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use council_domain::automation::Automation;
use council_domain::error::{CouncilError, DuplicateNameError, ValidationError};

use crate::ports::DefinitionStore;

/// One async lock per automation name.
#[derive(Debug, Default)]
pub(crate) struct NameLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NameLocks {
    pub(crate) async fn lock(&self, name: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Unlock `name` and drop its entry when no other task holds or awaits it.
    pub(crate) fn release(&self, name: &str, guard: tokio::sync::OwnedMutexGuard<()>) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        drop(guard);
        if locks.get(name).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(name);
        }
    }
}

/// Registry of automation definitions.
pub struct AutomationRegistry<S> {
    store: S,
    index: RwLock<BTreeMap<String, Automation>>,
    locks: NameLocks,
}

impl<S: DefinitionStore> AutomationRegistry<S> {
    /// Create an empty registry backed by `store`. Call [`load`](Self::load) to fill it.
    pub fn new(store: S) -> Self {
        Self {
            store,
            index: RwLock::new(BTreeMap::new()),
            locks: NameLocks::default(),
        }
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Automation>> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Automation>> {
        self.index
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn persist(&self, automation: &Automation) -> Result<(), CouncilError> {
        let document = serde_json::to_value(automation)
            .map_err(|err| ValidationError::Malformed(err.to_string()))?;
        self.store.write(&automation.name, &document).await
    }

    /// Replace the index with every valid definition in the store.
    ///
    /// Unreadable, invalid and duplicate documents are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the store itself cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<Automation>, CouncilError> {
        let stored = self.store.load_all().await?;
        let mut loaded = BTreeMap::new();
        for definition in stored {
            let automation = match definition.document {
                Ok(document) => serde_json::from_value::<Automation>(document)
                    .map_err(|err| err.to_string())
                    .and_then(|a| a.validate().map(|()| a).map_err(|err| err.to_string())),
                Err(message) => Err(message),
            };
            match automation {
                Ok(automation) if loaded.contains_key(&automation.name) => {
                    tracing::warn!(
                        key = %definition.key,
                        name = %automation.name,
                        "skipping duplicate automation definition"
                    );
                }
                Ok(automation) => {
                    loaded.insert(automation.name.clone(), automation);
                }
                Err(reason) => {
                    tracing::warn!(key = %definition.key, %reason, "skipping corrupt automation definition");
                }
            }
        }
        tracing::info!(count = loaded.len(), "automation definitions loaded");
        let automations = loaded.values().cloned().collect();
        *self.write_index() = loaded;
        Ok(automations)
    }

    /// Look up an automation by name.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`] when no automation has that name.
    pub fn get(&self, name: &str) -> Result<Automation, CouncilError> {
        self.find(name)
            .ok_or_else(|| CouncilError::automation_not_found(name))
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<Automation> {
        self.read_index().get(name).cloned()
    }

    /// Every automation, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<Automation> {
        self.read_index().values().cloned().collect()
    }

    /// Create a draft automation with default version and storage binding.
    ///
    /// An empty `base_path` selects `/api/{name}`.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::DuplicateName`] when the name is taken,
    /// [`CouncilError::Validation`] for an invalid definition, or a storage error.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        base_path: &str,
    ) -> Result<Automation, CouncilError> {
        let automation = Automation::builder()
            .name(name)
            .description(description)
            .base_path(base_path)
            .build()?;
        self.insert(automation).await
    }

    /// Add a fully specified automation under a new name.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    #[tracing::instrument(skip(self, automation), fields(name = %automation.name))]
    pub async fn insert(&self, automation: Automation) -> Result<Automation, CouncilError> {
        automation.validate()?;
        let _guard = self.locks.lock(&automation.name).await;
        if self.read_index().contains_key(&automation.name) {
            return Err(DuplicateNameError(automation.name.clone()).into());
        }
        self.persist(&automation).await?;
        self.write_index()
            .insert(automation.name.clone(), automation.clone());
        tracing::info!("automation created");
        Ok(automation)
    }

    /// Replace the definition stored under `name`.
    ///
    /// `id`, `name` and `created_at` of the stored definition are kept;
    /// `updated_at` is bumped.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`], [`CouncilError::Validation`] or a storage error.
    pub async fn update(
        &self,
        name: &str,
        automation: Automation,
    ) -> Result<Automation, CouncilError> {
        let (updated, ()) = self
            .modify(name, move |current| {
                let (id, created_at) = (current.id, current.created_at);
                let name = std::mem::take(&mut current.name);
                *current = automation;
                current.id = id;
                current.name = name;
                current.created_at = created_at;
                Ok(())
            })
            .await?;
        Ok(updated)
    }

    /// Read-modify-write one automation under its lock.
    ///
    /// `f` edits a copy; the copy is validated, stamped, persisted and only
    /// then published to the index. Returns the stored automation and the
    /// value produced by `f`.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`], any error produced by `f`, a
    /// validation error for the edited copy, or a storage error.
    #[tracing::instrument(skip(self, f))]
    pub async fn modify<T, F>(&self, name: &str, f: F) -> Result<(Automation, T), CouncilError>
    where
        F: FnOnce(&mut Automation) -> Result<T, CouncilError> + Send,
        T: Send,
    {
        let _guard = self.locks.lock(name).await;
        let mut automation = self.get(name)?;
        let output = f(&mut automation)?;
        automation.validate()?;
        automation.touch();
        self.persist(&automation).await?;
        self.write_index()
            .insert(automation.name.clone(), automation.clone());
        Ok((automation, output))
    }

    /// Delete the definition stored under `name`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the store cannot remove the document.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<bool, CouncilError> {
        let guard = self.locks.lock(name).await;
        let in_index = self.read_index().contains_key(name);
        let in_store = self.store.remove(name).await?;
        self.write_index().remove(name);
        self.locks.release(name, guard);
        Ok(in_index || in_store)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::StoredDefinition;
    use council_domain::automation::{AutomationStatus, Endpoint, HttpMethod};
    use serde_json::{Value, json};
    use std::future::Future;

    /// Definition store keeping documents in a map.
    #[derive(Default, Clone)]
    pub(crate) struct InMemoryDefinitionStore {
        pub(crate) documents: Arc<Mutex<BTreeMap<String, Result<Value, String>>>>,
        pub(crate) fail_writes: Arc<std::sync::atomic::AtomicBool>,
    }

    impl DefinitionStore for InMemoryDefinitionStore {
        fn load_all(
            &self,
        ) -> impl Future<Output = Result<Vec<StoredDefinition>, CouncilError>> + Send {
            let documents = self.documents.lock().unwrap();
            let result: Vec<StoredDefinition> = documents
                .iter()
                .map(|(key, document)| StoredDefinition {
                    key: key.clone(),
                    document: document.clone(),
                })
                .collect();
            async { Ok(result) }
        }

        fn write(
            &self,
            name: &str,
            document: &Value,
        ) -> impl Future<Output = Result<(), CouncilError>> + Send {
            let result = if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                Err(CouncilError::storage(std::io::Error::other("disk full")))
            } else {
                self.documents
                    .lock()
                    .unwrap()
                    .insert(name.to_string(), Ok(document.clone()));
                Ok(())
            };
            async { result }
        }

        fn remove(&self, name: &str) -> impl Future<Output = Result<bool, CouncilError>> + Send {
            let removed = self.documents.lock().unwrap().remove(name).is_some();
            async move { Ok(removed) }
        }
    }

    fn make_registry() -> AutomationRegistry<InMemoryDefinitionStore> {
        AutomationRegistry::new(InMemoryDefinitionStore::default())
    }

    #[tokio::test]
    async fn should_create_draft_with_defaults() {
        let registry = make_registry();
        let created = registry.create("orders", "Orders", "").await.unwrap();
        assert_eq!(created.status, AutomationStatus::Draft);
        assert_eq!(created.base_path, "/api/orders");
        assert_eq!(created.version, "1.0.0");
        assert_eq!(registry.get("orders").unwrap(), created);
    }

    #[tokio::test]
    async fn should_reject_duplicate_name() {
        let registry = make_registry();
        registry.create("orders", "", "").await.unwrap();
        let err = registry.create("orders", "", "").await.unwrap_err();
        assert!(matches!(err, CouncilError::DuplicateName(DuplicateNameError(name)) if name == "orders"));
    }

    #[tokio::test]
    async fn should_round_trip_through_store_except_updated_at() {
        let store = InMemoryDefinitionStore::default();
        let registry = AutomationRegistry::new(store.clone());
        let created = registry.create("orders", "Orders", "/shop").await.unwrap();
        let (modified, ()) = registry
            .modify("orders", |a| {
                a.add_endpoint(Endpoint::new(HttpMethod::Get, "/stats"))?;
                Ok(())
            })
            .await
            .unwrap();

        let reloaded = AutomationRegistry::new(store);
        let loaded = reloaded.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        let mut back = loaded.into_iter().next().unwrap();
        assert_eq!(back.id, created.id);
        assert_eq!(back.created_at, created.created_at);
        back.updated_at = modified.updated_at;
        assert_eq!(back, modified);
    }

    #[tokio::test]
    async fn should_skip_corrupt_definitions_on_load() {
        let store = InMemoryDefinitionStore::default();
        {
            let mut documents = store.documents.lock().unwrap();
            documents.insert("broken".to_string(), Err("expected value at line 1".to_string()));
            documents.insert("invalid".to_string(), Ok(json!({"name": "Bad Name"})));
        }
        let registry = AutomationRegistry::new(store.clone());
        registry.create("orders", "", "").await.unwrap();

        let loaded = AutomationRegistry::new(store).load().await.unwrap();
        let names: Vec<_> = loaded.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["orders"]);
    }

    #[tokio::test]
    async fn should_keep_first_of_duplicate_names_on_load() {
        let store = InMemoryDefinitionStore::default();
        let registry = AutomationRegistry::new(store.clone());
        let original = registry.create("orders", "first", "").await.unwrap();
        let copy = serde_json::to_value(
            Automation::builder()
                .name("orders")
                .description("second")
                .build()
                .unwrap(),
        )
        .unwrap();
        store
            .documents
            .lock()
            .unwrap()
            .insert("orders-copy".to_string(), Ok(copy));

        let loaded = AutomationRegistry::new(store).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, original.id);
    }

    #[tokio::test]
    async fn should_preserve_identity_on_update() {
        let registry = make_registry();
        let created = registry.create("orders", "", "").await.unwrap();
        let replacement = Automation::builder()
            .name("orders")
            .description("changed")
            .build()
            .unwrap();
        let updated = registry.update("orders", replacement).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.description, "changed");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn should_fail_update_when_missing() {
        let registry = make_registry();
        let replacement = Automation::builder().name("ghost").build().unwrap();
        let err = registry.update("ghost", replacement).await.unwrap_err();
        assert!(matches!(err, CouncilError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_leave_index_untouched_when_write_fails() {
        let store = InMemoryDefinitionStore::default();
        let registry = AutomationRegistry::new(store.clone());
        registry.create("orders", "", "").await.unwrap();
        store
            .fail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let result = registry
            .modify("orders", |a| {
                a.description = "lost".to_string();
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CouncilError::Storage(_))));
        assert_eq!(registry.get("orders").unwrap().description, "");
        assert!(registry.create("customers", "", "").await.is_err());
        assert!(registry.find("customers").is_none());
    }

    #[tokio::test]
    async fn should_reject_invalid_edit_without_persisting() {
        let registry = make_registry();
        registry.create("orders", "", "").await.unwrap();
        let result = registry
            .modify("orders", |a| {
                a.base_path = "no-slash".to_string();
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CouncilError::Validation(_))));
        assert_eq!(registry.get("orders").unwrap().base_path, "/api/orders");
    }

    #[tokio::test]
    async fn should_report_whether_delete_removed_anything() {
        let registry = make_registry();
        registry.create("orders", "", "").await.unwrap();
        assert!(registry.delete("orders").await.unwrap());
        assert!(!registry.delete("orders").await.unwrap());
        assert!(registry.find("orders").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_not_lose_concurrent_modifications() {
        let registry = Arc::new(make_registry());
        registry.create("orders", "", "").await.unwrap();
        let mut tasks = Vec::new();
        for i in 0..20 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry
                    .modify("orders", move |a| {
                        a.add_endpoint(Endpoint::new(HttpMethod::Get, format!("/e{i}")))?;
                        Ok(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.get("orders").unwrap().endpoints.len(), 20);
    }

    #[tokio::test]
    async fn should_list_sorted_by_name() {
        let registry = make_registry();
        registry.create("zeta", "", "").await.unwrap();
        registry.create("alpha", "", "").await.unwrap();
        let names: Vec<_> = registry.list().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn should_keep_serializing_name_when_released_with_a_waiter() {
        use std::time::Duration;

        let locks = Arc::new(NameLocks::default());
        let first = locks.lock("orders").await;
        let waiter = tokio::spawn({
            let locks = Arc::clone(&locks);
            async move { locks.lock("orders").await }
        });
        tokio::task::yield_now().await;

        locks.release("orders", first);
        let held = waiter.await.unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), locks.lock("orders"))
                .await
                .is_err()
        );
        drop(held);
        assert!(
            tokio::time::timeout(Duration::from_secs(1), locks.lock("orders"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn should_drop_idle_lock_entry_on_release() {
        let locks = NameLocks::default();
        let guard = locks.lock("orders").await;
        locks.release("orders", guard);
        assert!(locks.locks.lock().unwrap().is_empty());
    }
}
