// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource discovery for Kubernetes clusters.
//!
//! Discovers every namespaced resource type (including CRDs) at runtime and
//! keeps one process-wide snapshot, refreshed once its TTL runs out. Partial
//! discovery failures shrink the result instead of failing it; when nothing
//! at all could be discovered a small built-in set is returned.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::api::{ClusterApi, DiscoveryResponse, parse_group_version};
use super::error::ExplorerError;
use super::resources::ResourceType;

/// One discovery result
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Resource types in discovery order (group/version iteration order)
    pub resources: Vec<ResourceType>,
    /// API groups that failed discovery
    pub failed_groups: Vec<String>,
    /// True when this is the built-in set used after a total group failure
    pub fallback: bool,
    pub fetched_at: Instant,
}

impl CatalogSnapshot {
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Find a namespaced resource type by full name, falling back to the plural name
    pub fn resolve(&self, identifier: &str) -> Option<&ResourceType> {
        let namespaced = || self.resources.iter().filter(|r| r.namespaced);
        namespaced()
            .find(|r| r.full_name == identifier)
            .or_else(|| namespaced().find(|r| r.name == identifier))
    }
}

/// Cached snapshot plus the generation it belongs to
#[derive(Debug, Default)]
pub struct CatalogState {
    snapshot: Option<Arc<CatalogSnapshot>>,
    generation: u64,
}

impl CatalogState {
    /// Drop the snapshot and invalidate any refresh still running
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.generation += 1;
    }
}

/// Built-in resource types used when no API group could be discovered
///
/// Built from compile-time type information in k8s-openapi.
pub fn core_fallback() -> Vec<ResourceType> {
    use k8s_openapi::api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Pod, Secret, Service},
    };
    use kube::Resource;

    macro_rules! fallback_resource {
        ($type:ty, $short:expr) => {{
            ResourceType::new(
                <$type>::plural(&()),
                <$type>::kind(&()),
                <$type>::group(&()),
                <$type>::version(&()),
                true,
            )
            .with_short_name($short.map(String::from))
        }};
    }

    vec![
        fallback_resource!(Pod, Some("po")),
        fallback_resource!(Service, Some("svc")),
        fallback_resource!(ConfigMap, Some("cm")),
        fallback_resource!(Secret, None::<&str>),
        fallback_resource!(Deployment, Some("deploy")),
    ]
}

/// Turn discovery lists into resource types, skipping subresources
pub fn resources_from_discovery(response: &DiscoveryResponse) -> Vec<ResourceType> {
    let mut resources = Vec::new();

    for list in &response.lists {
        let Some((group, version)) = parse_group_version(&list.group_version) else {
            debug!(group_version = %list.group_version, "Unparseable group/version, skipping");
            continue;
        };

        for resource in &list.resources {
            // Skip subresources (e.g., pods/log, pods/exec)
            if resource.name.contains('/') {
                continue;
            }

            let short_name = resource
                .short_names
                .as_ref()
                .and_then(|names| names.first().cloned());

            resources.push(
                ResourceType::new(
                    resource.name.clone(),
                    resource.kind.clone(),
                    group,
                    version,
                    resource.namespaced,
                )
                .with_short_name(short_name),
            );
        }
    }

    resources
}

/// Process-wide catalog of namespaced resource types
pub struct ResourceCatalog {
    api: Arc<dyn ClusterApi>,
    ttl: Duration,
    state: RwLock<CatalogState>,
    /// Serializes refreshes so concurrent misses run one discovery
    refresh: Mutex<()>,
}

impl ResourceCatalog {
    pub fn new(api: Arc<dyn ClusterApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            state: RwLock::new(CatalogState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Current snapshot if it is still within its TTL
    pub async fn cached(&self) -> Option<Arc<CatalogSnapshot>> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .filter(|s| !s.is_expired(self.ttl))
            .cloned()
    }

    /// Age of the stored snapshot, fresh or not
    pub async fn snapshot_age(&self) -> Option<Duration> {
        self.state.read().await.snapshot.as_ref().map(|s| s.age())
    }

    /// Exclusive access to the catalog state, for clearing it together with
    /// other caches
    pub async fn state_mut(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().await
    }

    /// Resource types of the cluster, from cache when fresh
    pub async fn discover(&self) -> Result<Arc<CatalogSnapshot>, ExplorerError> {
        if let Some(snapshot) = self.cached().await {
            debug!(
                resources = snapshot.resources.len(),
                age_secs = snapshot.age().as_secs(),
                "Using cached API resources"
            );
            return Ok(snapshot);
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(snapshot) = self.cached().await {
            return Ok(snapshot);
        }

        let generation = self.state.read().await.generation;
        debug!("Cache miss or expired, discovering API resources");
        let start = Instant::now();

        let response = self
            .api
            .discover_preferred_resources()
            .await
            .map_err(ExplorerError::Discovery)?;

        if !response.failed_groups.is_empty() {
            warn!(
                failed = response.failed_groups.len(),
                groups = ?response.failed_groups,
                "Some API groups failed discovery"
            );
        }

        if response.lists.is_empty() && !response.failed_groups.is_empty() {
            let resources = core_fallback();
            warn!(count = resources.len(), "Using core resources fallback");
            // Not cached: the next request retries real discovery
            return Ok(Arc::new(CatalogSnapshot {
                resources,
                failed_groups: response.failed_groups,
                fallback: true,
                fetched_at: Instant::now(),
            }));
        }

        let snapshot = Arc::new(CatalogSnapshot {
            resources: resources_from_discovery(&response),
            failed_groups: response.failed_groups,
            fallback: false,
            fetched_at: Instant::now(),
        });

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&snapshot));
        }

        info!(
            resources = snapshot.resources.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "API resource discovery completed"
        );

        Ok(snapshot)
    }
}
