// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-namespace cache of counted resource types
//!
//! A namespace entry holds every countable resource type of the namespace
//! with its live object count. Entries are replaced whole after a scan and
//! expire after a fixed TTL. At most one scan per namespace is in flight;
//! concurrent callers share its result. Scans run on their own task, so a
//! caller going away never stops the cache from being populated.
//!
//! Clearing drops the resource catalog and every namespace entry together.
//! Scans started before a clear still answer their callers but do not store.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::counter::ObjectCounter;
use super::discovery::ResourceCatalog;
use super::error::ExplorerError;
use super::resources::{CountedResourceType, ResourceType};
use crate::progress::{ProgressEvent, ProgressReporter, ProgressSettings};

/// Resource types that are never counted: virtual, create-only review and
/// token request types that cannot be listed
pub const DEFAULT_SKIP_RESOURCES: &[&str] = &[
    "bindings",
    "localsubjectaccessreviews",
    "selfsubjectaccessreviews",
    "selfsubjectrulesreviews",
    "uploadtokenrequests",
    "tokenrequests",
    "subjectaccessreviews",
];

/// Result of one namespace scan
#[derive(Debug, Clone)]
pub struct NamespaceSnapshot {
    pub namespace: String,
    /// Counted resource types in discovery order
    pub resources: Vec<CountedResourceType>,
    /// API groups that were missing from the catalog used for this scan
    pub failed_groups: Vec<String>,
    /// Counted against the built-in resource set
    pub fallback: bool,
    pub fetched_at: Instant,
    pub refreshed_at: DateTime<Utc>,
}

impl NamespaceSnapshot {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn total_objects(&self) -> usize {
        self.resources.iter().map(|r| r.count).sum()
    }
}

type ScanResult = Result<Arc<NamespaceSnapshot>, ExplorerError>;
type ScanFuture = Shared<BoxFuture<'static, ScanResult>>;

/// A running scan: its progress events and its shared result
pub struct ScanHandle {
    pub events: broadcast::Receiver<ProgressEvent>,
    result: ScanFuture,
}

impl ScanHandle {
    /// Wait for the scan to finish
    pub async fn wait(self) -> ScanResult {
        self.result.await
    }

    /// The event receiver and a future for the result
    pub fn into_parts(self) -> (broadcast::Receiver<ProgressEvent>, ScanFuture) {
        (self.events, self.result)
    }
}

/// Outcome of a cache lookup
pub enum Lookup {
    Cached(Arc<NamespaceSnapshot>),
    /// Entry missing or stale; joined or started a scan
    Scanning(ScanHandle),
}

/// Cache behaviour, fixed at startup
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    /// Plural names (or full names) never passed to the counter
    pub skip_resources: HashSet<String>,
    /// Counts in flight per scan; 1 counts sequentially
    pub concurrency: usize,
    pub progress: ProgressSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            skip_resources: DEFAULT_SKIP_RESOURCES.iter().map(|s| s.to_string()).collect(),
            concurrency: 8,
            progress: ProgressSettings::default(),
        }
    }
}

/// Cache entry state for display
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceCacheStatus {
    pub namespace: String,
    pub resource_types: usize,
    pub total_objects: usize,
    pub age_secs: u64,
    pub fresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Age of the catalog snapshot, if one is stored
    pub catalog_age_secs: Option<u64>,
    pub namespaces: Vec<NamespaceCacheStatus>,
    /// Namespaces with a scan in flight
    pub scanning: Vec<String>,
}

struct InFlight {
    id: u64,
    events: broadcast::Sender<ProgressEvent>,
    result: ScanFuture,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<NamespaceSnapshot>>,
    in_flight: HashMap<String, InFlight>,
    generation: u64,
    next_id: u64,
}

impl CacheState {
    /// Drop the in-flight entry of scan `id`, unless a newer scan replaced it
    fn finish_scan(&mut self, namespace: &str, id: u64) {
        if self.in_flight.get(namespace).is_some_and(|f| f.id == id) {
            self.in_flight.remove(namespace);
        }
    }
}

struct Inner {
    catalog: Arc<ResourceCatalog>,
    counter: Arc<ObjectCounter>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

/// Namespace cache service; cheap to clone, clones share state
#[derive(Clone)]
pub struct NamespaceCache {
    inner: Arc<Inner>,
}

impl NamespaceCache {
    pub fn new(catalog: Arc<ResourceCatalog>, counter: Arc<ObjectCounter>, settings: CacheSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                counter,
                settings,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<ResourceCatalog> {
        &self.inner.catalog
    }

    /// Fresh entry, or a handle on the (possibly just started) scan
    pub fn lookup(&self, namespace: &str) -> Lookup {
        let inner = &self.inner;
        let mut state = inner.lock_state();

        if let Some(entry) = state.entries.get(namespace)
            && entry.is_fresh(inner.settings.ttl)
        {
            debug!(
                namespace = %namespace,
                resource_types = entry.resources.len(),
                age_secs = entry.age().as_secs(),
                "Using cached namespace resources"
            );
            return Lookup::Cached(Arc::clone(entry));
        }

        if let Some(flight) = state.in_flight.get(namespace) {
            // A finished entry here means its task died before cleaning up
            if flight.result.peek().is_none() {
                debug!(namespace = %namespace, "Joining in-flight scan");
                return Lookup::Scanning(ScanHandle {
                    events: flight.events.subscribe(),
                    result: flight.result.clone(),
                });
            }
            state.in_flight.remove(namespace);
        }

        let (sender, events) = broadcast::channel(inner.settings.progress.buffer.max(1));
        let id = state.next_id;
        state.next_id += 1;
        let generation = state.generation;

        let reporter = ProgressReporter::new(namespace, sender.clone(), inner.settings.progress);
        let task = tokio::spawn(Arc::clone(inner).scan(namespace.to_string(), reporter, generation, id));

        let owner = Arc::downgrade(inner);
        let aborted = namespace.to_string();
        let result = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(namespace = %aborted, error = %e, "Namespace scan task failed");
                    if let Some(inner) = owner.upgrade() {
                        inner.lock_state().finish_scan(&aborted, id);
                    }
                    Err(ExplorerError::ScanAborted(aborted))
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            namespace.to_string(),
            InFlight {
                id,
                events: sender,
                result: result.clone(),
            },
        );

        Lookup::Scanning(ScanHandle { events, result })
    }

    /// Counted resource types of `namespace`, from cache when fresh
    pub async fn get_resources(&self, namespace: &str) -> ScanResult {
        match self.lookup(namespace) {
            Lookup::Cached(snapshot) => Ok(snapshot),
            Lookup::Scanning(handle) => handle.wait().await,
        }
    }

    /// Drop the catalog and every namespace entry at once
    pub async fn clear(&self) {
        let mut catalog = self.inner.catalog.state_mut().await;
        let mut state = self.inner.lock_state();

        catalog.reset();
        let entries = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.generation += 1;

        info!(namespaces = entries, "Cache cleared");
    }

    pub async fn status(&self) -> CacheStatus {
        let catalog_age_secs = self.inner.catalog.snapshot_age().await.map(|a| a.as_secs());
        let state = self.inner.lock_state();

        let mut namespaces: Vec<_> = state
            .entries
            .values()
            .map(|entry| NamespaceCacheStatus {
                namespace: entry.namespace.clone(),
                resource_types: entry.resources.len(),
                total_objects: entry.total_objects(),
                age_secs: entry.age().as_secs(),
                fresh: entry.is_fresh(self.inner.settings.ttl),
            })
            .collect();
        namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));

        let mut scanning: Vec<_> = state.in_flight.keys().cloned().collect();
        scanning.sort();

        CacheStatus {
            catalog_age_secs,
            namespaces,
            scanning,
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_count(&self, resource: &ResourceType) -> bool {
        let skip = &self.settings.skip_resources;
        resource.namespaced && !skip.contains(&resource.name) && !skip.contains(&resource.full_name)
    }

    async fn scan(
        self: Arc<Self>,
        namespace: String,
        reporter: ProgressReporter,
        generation: u64,
        id: u64,
    ) -> ScanResult {
        reporter.scan_started();
        let result = self.count_namespace(&namespace, &reporter).await;

        {
            let mut state = self.lock_state();
            state.finish_scan(&namespace, id);
            if let Ok(snapshot) = &result {
                if state.generation == generation {
                    state.entries.insert(namespace.clone(), Arc::clone(snapshot));
                } else {
                    debug!(namespace = %namespace, "Cache cleared during scan, result not stored");
                }
            }
        }

        match &result {
            Ok(snapshot) => reporter.scan_complete(snapshot.resources.len(), snapshot.total_objects()),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Namespace scan failed");
                reporter.scan_failed(&e.to_string());
            }
        }

        result
    }

    async fn count_namespace(&self, namespace: &str, reporter: &ProgressReporter) -> ScanResult {
        let start = Instant::now();
        let catalog = self.catalog.discover().await?;

        let targets: Vec<ResourceType> = catalog
            .resources
            .iter()
            .filter(|r| self.should_count(r))
            .cloned()
            .collect();
        reporter.catalog_resolved(targets.len(), catalog.failed_groups.len());

        debug!(
            namespace = %namespace,
            resource_types = targets.len(),
            concurrency = self.settings.concurrency,
            "Counting namespace resources"
        );

        let counter = Arc::clone(&self.counter);
        let scanned: Arc<str> = Arc::from(namespace);
        let resources: Vec<CountedResourceType> = stream::iter(targets)
            .map(move |resource| {
                let counter = Arc::clone(&counter);
                let namespace = Arc::clone(&scanned);
                async move {
                    let count = match counter.count(&namespace, &resource).await {
                        Ok(count) => count,
                        Err(e) => {
                            warn!(
                                resource = %e.resource,
                                namespace = %e.namespace,
                                error = %e.source,
                                "Failed to count resource, using 0"
                            );
                            0
                        }
                    };
                    CountedResourceType { resource, count }
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .inspect(|counted| reporter.resource_counted(&counted.resource.full_name, counted.count))
            .collect()
            .await;

        let snapshot = NamespaceSnapshot {
            namespace: namespace.to_string(),
            resources,
            failed_groups: catalog.failed_groups.clone(),
            fallback: catalog.fallback,
            fetched_at: Instant::now(),
            refreshed_at: Utc::now(),
        };

        info!(
            namespace = %namespace,
            resource_types = snapshot.resources.len(),
            total_objects = snapshot.total_objects(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Namespace scan completed"
        );

        Ok(Arc::new(snapshot))
    }
}
