//! Namespace registry owning the `sync` and `local` stores.
//!
//! # Invariants
//! - Exactly two stores exist; resolution never creates another.
//! - Each store sits behind its own mutex, so namespaces never block each other.
//! - A poisoned lock is recovered; store mutations cannot leave partial state.

use crate::config::SeedConfig;
use crate::model::namespace::{Namespace, NAMESPACE_LOCAL};
use crate::model::value::ValueMap;
use crate::settings::SettingsProvider;
use crate::store::kv_store::Store;
use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-scoped owner of both namespace stores.
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    sync: Mutex<Store>,
    local: Mutex<Store>,
}

impl NamespaceRegistry {
    /// Registry with empty stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `sync` seeded from `seed` and the current personal token.
    pub fn seeded(seed: &SeedConfig, settings: &dyn SettingsProvider) -> Self {
        let entries = seed.build_sync_seed(settings.personal_token().as_str());
        Self {
            sync: Mutex::new(Store::with_entries(entries)),
            local: Mutex::new(Store::new()),
        }
    }

    /// Resolves a raw namespace; unrecognized values select `local`.
    pub fn resolve(&self, raw: &str) -> Namespace {
        let namespace = Namespace::parse(raw);
        if namespace == Namespace::Local && raw != NAMESPACE_LOCAL {
            debug!(
                "event=namespace_fallback module=store status=ok raw_len={} resolved={}",
                raw.len(),
                namespace
            );
        }
        namespace
    }

    /// Runs `f` with exclusive access to one namespace store.
    ///
    /// This is the linearization point for that namespace.
    pub fn with_store<T>(&self, namespace: Namespace, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut guard = self.lock(namespace);
        f(&mut *guard)
    }

    pub fn read(&self, namespace: Namespace) -> ValueMap {
        self.with_store(namespace, |store| store.snapshot())
    }

    pub fn project(&self, namespace: Namespace, keys: Option<&[String]>) -> ValueMap {
        self.with_store(namespace, |store| store.project(keys))
    }

    /// Swaps the whole mapping and returns the previous one.
    pub fn replace(&self, namespace: Namespace, entries: ValueMap) -> ValueMap {
        self.with_store(namespace, |store| store.replace(entries))
    }

    pub fn merge(&self, namespace: Namespace, partial: &ValueMap) {
        self.with_store(namespace, |store| store.merge(partial));
    }

    /// Keeps only entries whose key is not in `keys`.
    pub fn remove_keys(&self, namespace: Namespace, keys: &[String]) {
        self.with_store(namespace, |store| store.retain_unlisted(keys));
    }

    fn lock(&self, namespace: Namespace) -> MutexGuard<'_, Store> {
        let slot = match namespace {
            Namespace::Sync => &self.sync,
            Namespace::Local => &self.local,
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
