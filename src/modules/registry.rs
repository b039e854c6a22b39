use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::database::store::{CompanyStore, StoreError};
use crate::hooks::{handlers_for_manifest, HookDispatcher};
use crate::loader::LoadOutcome;
use crate::modules::manifest::{ManifestError, ModuleManifest};
use crate::types::CompanyId;

/// A module instance whose manifest could not be used
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidModule {
    pub slug: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total_modules: usize,
    pub by_category: BTreeMap<String, usize>,
    pub invalid_modules: usize,
}

/// Immutable view of one load: manifests and the hooks they declared travel
/// together and are replaced as a whole on every reload.
pub struct RegistrySnapshot {
    manifests: Vec<Arc<ModuleManifest>>,
    fingerprints: HashMap<String, String>,
    invalid: Vec<InvalidModule>,
    hooks: Arc<HookDispatcher>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    fn empty(handler_timeout: Duration) -> Self {
        Self {
            manifests: Vec::new(),
            fingerprints: HashMap::new(),
            invalid: Vec::new(),
            hooks: Arc::new(HookDispatcher::new(handler_timeout)),
            loaded_at: None,
        }
    }

    pub fn manifests(&self) -> &[Arc<ModuleManifest>] {
        &self.manifests
    }

    pub fn invalid(&self) -> &[InvalidModule] {
        &self.invalid
    }

    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.hooks
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn get(&self, slug: &str) -> Option<&Arc<ModuleManifest>> {
        self.manifests.iter().find(|m| m.slug == slug)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_category = BTreeMap::new();
        for manifest in &self.manifests {
            *by_category.entry(manifest.category.clone()).or_insert(0) += 1;
        }

        RegistryStats {
            total_modules: self.manifests.len(),
            by_category,
            invalid_modules: self.invalid.len(),
        }
    }
}

/// Installed modules of one company plus the hooks they registered.
///
/// Loads are numbered. A caller asks for a load by taking the next number and
/// then waits its turn on `load_lock`; whoever holds the lock fetches once for
/// every number handed out before its fetch began. A caller whose number was
/// already covered returns `Skipped` without touching the store.
pub struct ModuleRegistry {
    company_id: CompanyId,
    handler_timeout: Duration,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    load_lock: Mutex<()>,
    requested: AtomicU64,
    completed: AtomicU64,
}

impl ModuleRegistry {
    pub fn new(company_id: CompanyId, handler_timeout: Duration) -> Self {
        Self {
            company_id,
            handler_timeout,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::empty(handler_timeout))),
            load_lock: Mutex::new(()),
            requested: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Hooks of the current snapshot
    pub fn hooks(&self) -> Arc<HookDispatcher> {
        self.snapshot().hooks.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.load_lock.try_lock().is_err()
    }

    /// Current snapshot; stays consistent while a reload is running
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_manifest(&self, slug: &str) -> Option<Arc<ModuleManifest>> {
        self.snapshot().get(slug).cloned()
    }

    pub fn get_stats(&self) -> RegistryStats {
        self.snapshot().stats()
    }

    /// Loads once if nothing was loaded yet. Concurrent first callers wait for
    /// the one fetch instead of reading an empty registry.
    pub async fn ensure_loaded(&self, store: &dyn CompanyStore) -> Result<LoadOutcome, StoreError> {
        if self.completed.load(Ordering::SeqCst) > 0 {
            return Ok(LoadOutcome::Skipped);
        }
        self.requested.fetch_max(1, Ordering::SeqCst);
        self.load_through(store, 1).await
    }

    /// Fetches the company's active modules and swaps in a fresh snapshot. The
    /// result always reflects writes made before the call; a load already in
    /// flight when they happened does not count.
    pub async fn load_manifests(&self, store: &dyn CompanyStore) -> Result<LoadOutcome, StoreError> {
        let wanted = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        self.load_through(store, wanted).await
    }

    async fn load_through(&self, store: &dyn CompanyStore, wanted: u64) -> Result<LoadOutcome, StoreError> {
        if self.is_loading() {
            tracing::debug!("Module load in flight for company {}, waiting", self.company_id);
        }
        let _lock = self.load_lock.lock().await;

        if self.completed.load(Ordering::SeqCst) >= wanted {
            return Ok(LoadOutcome::Skipped);
        }

        // every request numbered up to here was made before this fetch starts
        let generation = self.requested.load(Ordering::SeqCst);
        let instances = store.list_active_modules(self.company_id).await?;
        let previous = self.snapshot();

        let mut manifests = Vec::with_capacity(instances.len());
        let mut fingerprints = HashMap::new();
        let mut invalid = Vec::new();

        for instance in instances {
            let parsed = ModuleManifest::from_value(instance.manifest).and_then(|m| {
                if m.slug == instance.slug {
                    Ok(m)
                } else {
                    Err(ManifestError::SlugMismatch {
                        manifest: m.slug,
                        instance: instance.slug.clone(),
                    })
                }
            });

            match parsed {
                Ok(manifest) => {
                    let fingerprint = manifest.fingerprint();
                    match previous.fingerprints.get(&manifest.slug) {
                        Some(old) if *old != fingerprint => {
                            tracing::info!("Manifest for module '{}' replaced (now v{})", manifest.slug, manifest.version)
                        }
                        None => tracing::debug!("Loaded module '{}' v{}", manifest.slug, manifest.version),
                        _ => {}
                    }
                    fingerprints.insert(manifest.slug.clone(), fingerprint);
                    manifests.push(Arc::new(manifest));
                }
                Err(e) => {
                    tracing::warn!(
                        "Module '{}' of company {} has an invalid manifest: {}",
                        instance.slug,
                        self.company_id,
                        e
                    );
                    invalid.push(InvalidModule {
                        slug: instance.slug,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let registrations = manifests
            .iter()
            .flat_map(|m| handlers_for_manifest(m))
            .collect::<Vec<_>>();
        let hooks = HookDispatcher::with_registrations(self.handler_timeout, registrations);

        let snapshot = Arc::new(RegistrySnapshot {
            manifests,
            fingerprints,
            invalid,
            hooks: Arc::new(hooks),
            loaded_at: Some(Utc::now()),
        });

        tracing::info!(
            "Module registry for company {} loaded: {} modules, {} invalid",
            self.company_id,
            snapshot.manifests().len(),
            snapshot.invalid().len()
        );
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.completed.store(generation, Ordering::SeqCst);

        Ok(LoadOutcome::Loaded)
    }
}

/// One registry per company, created on first use
pub struct RegistryCache {
    registries: tokio::sync::RwLock<HashMap<CompanyId, Arc<ModuleRegistry>>>,
    handler_timeout: Duration,
}

impl RegistryCache {
    pub fn new(handler_timeout: Duration) -> Self {
        Self {
            registries: tokio::sync::RwLock::new(HashMap::new()),
            handler_timeout,
        }
    }

    pub async fn for_company(&self, company_id: CompanyId) -> Arc<ModuleRegistry> {
        if let Some(registry) = self.registries.read().await.get(&company_id) {
            return registry.clone();
        }

        let mut registries = self.registries.write().await;
        registries
            .entry(company_id)
            .or_insert_with(|| Arc::new(ModuleRegistry::new(company_id, self.handler_timeout)))
            .clone()
    }
}
