//! Process-wide cache of the function registry, the name → endpoint
//! mapping, and the navigation edge map.
//!
//! Built lazily on first access. Every read spot-checks a random sample of
//! endpoints and rebuilds the whole cache if any check fails, so a corrupted
//! cache heals itself on the next call.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use serde::Serialize;

use crate::edges::EdgeMap;
use crate::endpoint::{Endpoint, EndpointCatalog, EndpointProvider, FunctionDescriptor};

/// Endpoints spot-checked on each read.
pub const VALIDATION_SAMPLE_SIZE: usize = 5;

/// An immutable, versioned view of the registry.
pub struct RegistrySnapshot {
    pub functions: BTreeMap<String, FunctionDescriptor>,
    pub endpoints: BTreeMap<String, Arc<dyn Endpoint>>,
    pub edge_map: EdgeMap,
    pub version: u64,
    pub initialized_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    fn build(catalog: EndpointCatalog, version: u64) -> Self {
        let mut functions = BTreeMap::new();
        let mut endpoints = BTreeMap::new();
        for endpoint in catalog.endpoints {
            let name = endpoint.name().to_string();
            if endpoints.contains_key(&name) {
                tracing::warn!(endpoint = %name, "Duplicate endpoint name, keeping the first");
                continue;
            }
            functions.insert(name.clone(), endpoint.descriptor().clone());
            endpoints.insert(name, endpoint);
        }
        let edge_map = EdgeMap::build(
            &catalog.declared_edges,
            functions.keys().map(String::as_str),
        );
        Self {
            functions,
            endpoints,
            edge_map,
            version,
            initialized_at: Utc::now(),
        }
    }

    pub fn endpoint(&self, name: &str) -> Option<&Arc<dyn Endpoint>> {
        self.endpoints.get(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Check registry/mapping consistency and probe up to `sample` random
    /// endpoints.
    fn check(&self, sample: usize) -> Result<(), String> {
        if self.functions.len() != self.endpoints.len() {
            return Err(format!(
                "registry has {} functions but mapping has {} entries",
                self.functions.len(),
                self.endpoints.len()
            ));
        }
        let mut probes: Vec<_> = self.endpoints.iter().collect();
        fastrand::shuffle(&mut probes);
        for (name, endpoint) in probes.into_iter().take(sample) {
            if !self.functions.contains_key(name) {
                return Err(format!("'{name}' is mapped but not registered"));
            }
            if endpoint.name() != name {
                return Err(format!("'{name}' maps to endpoint '{}'", endpoint.name()));
            }
            if !endpoint.is_callable() {
                return Err(format!("'{name}' is not callable"));
            }
        }
        Ok(())
    }
}

// ── Status Reports ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Corrupted,
    #[serde(rename = "not initialized")]
    NotInitialized,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryMetrics {
    pub registry_functions: usize,
    pub func_mapping_entries: usize,
    pub navigation_edges: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleCheck {
    pub sample_check_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub cached: bool,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialized_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RegistryMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<SampleCheck>,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidationReport {
    pub status: &'static str,
    pub was_cached: bool,
    pub previous_version: u64,
    pub timestamp: DateTime<Utc>,
}

// ── Cache ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Building,
    Ready,
    Corrupted,
}

struct CacheState {
    snapshot: Option<Arc<RegistrySnapshot>>,
    version: u64,
    phase: Phase,
}

pub struct RegistryCache {
    provider: Arc<dyn EndpointProvider>,
    sample_size: usize,
    state: ReentrantMutex<RefCell<CacheState>>,
}

impl RegistryCache {
    pub fn new(provider: Arc<dyn EndpointProvider>) -> Self {
        Self {
            provider,
            sample_size: VALIDATION_SAMPLE_SIZE,
            state: ReentrantMutex::new(RefCell::new(CacheState {
                snapshot: None,
                version: 0,
                phase: Phase::Uninitialized,
            })),
        }
    }

    /// The current snapshot, built on first use and rebuilt whenever the
    /// sample check fails.
    pub fn get(&self) -> Arc<RegistrySnapshot> {
        let guard = self.state.lock();
        let current = guard.borrow().snapshot.clone();
        if let Some(snapshot) = current {
            match snapshot.check(self.sample_size) {
                Ok(()) => return snapshot,
                Err(reason) => {
                    tracing::warn!(
                        version = snapshot.version,
                        reason = %reason,
                        "Registry cache corrupted, rebuilding"
                    );
                    let mut state = guard.borrow_mut();
                    state.snapshot = None;
                    state.phase = Phase::Corrupted;
                }
            }
        }
        self.rebuild(&guard)
    }

    fn rebuild(&self, state: &RefCell<CacheState>) -> Arc<RegistrySnapshot> {
        let previous = state.borrow().phase;
        state.borrow_mut().phase = Phase::Building;
        let started = Instant::now();

        let snapshot = match self.provider.catalog() {
            Ok(catalog) => {
                let version = state.borrow().version + 1;
                state.borrow_mut().version = version;
                RegistrySnapshot::build(catalog, version)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Endpoint catalog unavailable, serving an empty registry");
                RegistrySnapshot::build(EndpointCatalog::default(), state.borrow().version)
            }
        };

        tracing::info!(
            functions = snapshot.functions.len(),
            navigation_edges = snapshot.edge_map.edge_count(),
            version = snapshot.version,
            after = ?previous,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Function registry built"
        );

        let snapshot = Arc::new(snapshot);
        let mut state = state.borrow_mut();
        state.snapshot = Some(Arc::clone(&snapshot));
        state.phase = Phase::Ready;
        snapshot
    }

    pub fn version(&self) -> u64 {
        self.state.lock().borrow().version
    }

    /// Report cache health without triggering a rebuild.
    pub fn status(&self) -> RegistryStatus {
        let guard = self.state.lock();
        let state = guard.borrow();
        let Some(snapshot) = state.snapshot.as_ref() else {
            return RegistryStatus {
                cached: false,
                version: state.version,
                initialized_at: None,
                age_seconds: None,
                metrics: None,
                validation: None,
                status: HealthStatus::NotInitialized,
            };
        };

        let check = snapshot.check(self.sample_size);
        let age_ms = (Utc::now() - snapshot.initialized_at).num_milliseconds();
        RegistryStatus {
            cached: true,
            version: snapshot.version,
            initialized_at: Some(snapshot.initialized_at),
            age_seconds: Some((age_ms as f64 / 100.0).round() / 10.0),
            metrics: Some(RegistryMetrics {
                registry_functions: snapshot.functions.len(),
                func_mapping_entries: snapshot.endpoints.len(),
                navigation_edges: snapshot.edge_map.edge_count(),
            }),
            status: if check.is_ok() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Corrupted
            },
            validation: Some(SampleCheck {
                sample_check_passed: check.is_ok(),
                error: check.err(),
            }),
        }
    }

    /// Drop the cached snapshot; the next read rebuilds it.
    pub fn invalidate(&self) -> InvalidationReport {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let was_cached = state.snapshot.take().is_some();
        state.phase = Phase::Uninitialized;
        tracing::info!(version = state.version, was_cached, "Registry cache invalidated");
        InvalidationReport {
            status: "cleared",
            was_cached,
            previous_version: state.version,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{DeclaredEdge, EndpointContext};
    use crate::error::EndpointError;
    use async_trait::async_trait;
    use graphgate_core::EntityType;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Probe {
        descriptor: FunctionDescriptor,
        healthy: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Endpoint for Probe {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.descriptor
        }

        async fn invoke(
            &self,
            _ctx: &EndpointContext,
            _args: &Map<String, Value>,
        ) -> Result<Value, EndpointError> {
            Ok(Value::Array(vec![]))
        }

        fn is_callable(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    /// Builds fresh probes on every call and keeps their health flags.
    #[derive(Default)]
    struct Probes {
        builds: AtomicUsize,
        fail: AtomicBool,
        flags: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl EndpointProvider for Probes {
        fn catalog(&self) -> Result<EndpointCatalog, EndpointError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(EndpointError::Catalog("module missing".into()));
            }
            let names = ["get_diseases_for_gene", "get_genes_for_disease", "get_genes_in_pathway"];
            let mut flags = self.flags.lock().unwrap();
            flags.clear();
            let endpoints = names
                .iter()
                .map(|name| {
                    let healthy = Arc::new(AtomicBool::new(true));
                    flags.push(Arc::clone(&healthy));
                    Arc::new(Probe {
                        descriptor: FunctionDescriptor::new(name, "test", ""),
                        healthy,
                    }) as Arc<dyn Endpoint>
                })
                .collect();
            Ok(EndpointCatalog {
                endpoints,
                declared_edges: vec![DeclaredEdge::new(
                    EntityType::Pathway,
                    EntityType::Gene,
                    "get_genes_in_pathway",
                )],
            })
        }
    }

    #[test]
    fn test_lazy_build_and_reuse() {
        let provider = Arc::new(Probes::default());
        let cache = RegistryCache::new(provider.clone());
        assert_eq!(cache.status().status, HealthStatus::NotInitialized);

        let first = cache.get();
        let second = cache.get();
        assert_eq!(provider.builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.version, 1);
        assert_eq!(first.functions.len(), 3);
        assert_eq!(first.edge_map.edge_count(), 3);
    }

    #[test]
    fn test_corrupted_entry_triggers_rebuild() {
        let provider = Arc::new(Probes::default());
        let cache = RegistryCache::new(provider.clone());
        assert_eq!(cache.get().version, 1);

        provider.flags.lock().unwrap()[1].store(false, Ordering::SeqCst);
        assert_eq!(cache.status().status, HealthStatus::Corrupted);

        let rebuilt = cache.get();
        assert_eq!(rebuilt.version, 2);
        assert_eq!(provider.builds.load(Ordering::SeqCst), 2);
        assert!(rebuilt.endpoints.values().all(|e| e.is_callable()));
        assert_eq!(cache.status().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_invalidate_then_rebuild_bumps_version() {
        let provider = Arc::new(Probes::default());
        let cache = RegistryCache::new(provider.clone());
        cache.get();

        let report = cache.invalidate();
        assert_eq!(report.status, "cleared");
        assert!(report.was_cached);
        assert_eq!(report.previous_version, 1);
        assert!(!cache.status().cached);

        assert_eq!(cache.get().version, 2);
        assert!(cache.version() > report.previous_version);
    }

    #[test]
    fn test_provider_failure_leaves_empty_ready_cache() {
        let provider = Arc::new(Probes::default());
        provider.fail.store(true, Ordering::SeqCst);
        let cache = RegistryCache::new(provider.clone());

        let snapshot = cache.get();
        assert!(snapshot.is_empty());
        assert!(snapshot.edge_map.is_empty());

        let status = cache.status();
        assert!(status.cached);
        assert_eq!(status.status, HealthStatus::Healthy);
        assert_eq!(status.metrics.unwrap().registry_functions, 0);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let cache = RegistryCache::new(Arc::new(Probes::default()));
        let v = serde_json::to_value(cache.status()).unwrap();
        assert_eq!(v["status"], "not initialized");
        assert_eq!(v["cached"], false);
    }
}
