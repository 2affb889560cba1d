// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Operations exposed to the presentation layer.
//!
//! The cluster connection is optional: when it could not be established at
//! startup every operation fails fast with `ExplorerError::Unavailable`.

use async_stream::stream;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::api::ClusterApi;
use super::cache::{CacheStatus, Lookup, NamespaceCache};
use super::client::KubeClusterApi;
use super::counter::ObjectCounter;
use super::discovery::ResourceCatalog;
use super::error::ExplorerError;
use super::resources::{NamespaceResources, ObjectDetail, ObjectSummary, ResourceFilters, ResourceType};
use crate::config::Config;
use crate::progress::ProgressEvent;

struct Backend {
    api: Arc<dyn ClusterApi>,
    cache: NamespaceCache,
    context: String,
}

/// Entry point for every exposed operation
pub struct Explorer {
    backend: Option<Backend>,
}

impl Explorer {
    /// Explorer over an established cluster API
    pub fn new(api: Arc<dyn ClusterApi>, context: impl Into<String>, config: &Config) -> Self {
        let catalog = Arc::new(ResourceCatalog::new(Arc::clone(&api), config.catalog_ttl()));
        let counter = Arc::new(ObjectCounter::new(
            Arc::clone(&api),
            config.count_timeout(),
            config.count_page_size,
            config.expected_denial_codes.clone(),
        ));
        let cache = NamespaceCache::new(catalog, counter, config.cache_settings());

        Self {
            backend: Some(Backend {
                api,
                cache,
                context: context.into(),
            }),
        }
    }

    /// Explorer with no cluster behind it
    pub fn disconnected() -> Self {
        Self { backend: None }
    }

    /// Connect to the cluster; on failure, stay up without one
    pub async fn connect(config: &Config, context: Option<&str>) -> Self {
        match KubeClusterApi::connect(context).await {
            Ok(api) => {
                let context = api.context().to_string();
                info!(context = %context, "Connected to cluster");
                Self::new(Arc::new(api), context, config)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Could not connect to cluster, cluster operations unavailable");
                Self::disconnected()
            }
        }
    }

    /// Kubeconfig context in use
    pub fn context(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.context.as_str())
    }

    fn backend(&self) -> Result<&Backend, ExplorerError> {
        self.backend.as_ref().ok_or(ExplorerError::Unavailable)
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>, ExplorerError> {
        let backend = self.backend()?;
        Ok(backend.api.list_namespaces().await?)
    }

    /// Counted resource types of a namespace, filtered, in discovery order
    pub async fn get_namespace_resources(
        &self,
        namespace: &str,
        filters: &ResourceFilters,
    ) -> Result<NamespaceResources, ExplorerError> {
        let backend = self.backend()?;
        let snapshot = backend.cache.get_resources(namespace).await?;

        Ok(NamespaceResources {
            namespace: snapshot.namespace.clone(),
            resources: filters.apply(&snapshot.resources),
            total_objects: snapshot.total_objects(),
            discovered: snapshot.resources.len(),
            failed_groups: snapshot.failed_groups.clone(),
            fallback: snapshot.fallback,
            refreshed_at: snapshot.refreshed_at,
        })
    }

    /// Resolve a full name ("deployments.apps") or plural name ("pods")
    pub async fn resolve_resource(&self, identifier: &str) -> Result<ResourceType, ExplorerError> {
        let backend = self.backend()?;
        let catalog = backend.cache.catalog().discover().await?;
        catalog
            .resolve(identifier)
            .cloned()
            .ok_or_else(|| ExplorerError::UnknownResource(identifier.to_string()))
    }

    pub async fn get_resource_objects(
        &self,
        namespace: &str,
        resource: &str,
    ) -> Result<Vec<ObjectSummary>, ExplorerError> {
        let backend = self.backend()?;
        let resource = self.resolve_resource(resource).await?;

        let objects = backend.api.list_objects(&resource, namespace).await?;
        debug!(
            resource = %resource.full_name,
            namespace = %namespace,
            count = objects.len(),
            "Listed objects"
        );

        Ok(objects
            .iter()
            .map(|obj| ObjectSummary::from_object(obj, &resource))
            .collect())
    }

    pub async fn get_object(
        &self,
        namespace: &str,
        resource: &str,
        name: &str,
    ) -> Result<ObjectDetail, ExplorerError> {
        let backend = self.backend()?;
        let resource = self.resolve_resource(resource).await?;
        let obj = backend.api.get_object(&resource, namespace, name).await?;
        Ok(ObjectDetail::from_object(&obj, &resource))
    }

    /// The object exactly as the API server returned it
    pub async fn get_raw_object(
        &self,
        namespace: &str,
        resource: &str,
        name: &str,
    ) -> Result<serde_json::Value, ExplorerError> {
        let backend = self.backend()?;
        let resource = self.resolve_resource(resource).await?;
        let obj = backend.api.get_object(&resource, namespace, name).await?;
        serde_json::to_value(&obj).map_err(|e| ExplorerError::InvalidObject(e.to_string()))
    }

    /// Drop the catalog and every namespace entry
    pub async fn clear_cache(&self) -> Result<(), ExplorerError> {
        let backend = self.backend()?;
        backend.cache.clear().await;
        Ok(())
    }

    pub async fn cache_status(&self) -> Result<CacheStatus, ExplorerError> {
        let backend = self.backend()?;
        Ok(backend.cache.status().await)
    }

    /// Progress of the namespace's scan, ending with a terminal event.
    ///
    /// A fresh cache entry yields a single `UsingCache`. Otherwise the
    /// current scan is joined (or started). Dropping the stream does not
    /// stop the scan.
    pub fn stream_progress(&self, namespace: &str) -> BoxStream<'static, ProgressEvent> {
        let namespace = namespace.to_string();

        let cache = match &self.backend {
            Some(backend) => backend.cache.clone(),
            None => {
                return stream::once(async move {
                    ProgressEvent::ScanFailed {
                        namespace,
                        message: ExplorerError::Unavailable.to_string(),
                    }
                })
                .boxed();
            }
        };

        stream! {
            match cache.lookup(&namespace) {
                Lookup::Cached(snapshot) => {
                    yield ProgressEvent::UsingCache {
                        namespace: namespace.clone(),
                        resource_types: snapshot.resources.len(),
                        age_secs: snapshot.age().as_secs(),
                    };
                }
                Lookup::Scanning(handle) => {
                    let (mut events, result) = handle.into_parts();
                    loop {
                        match events.recv().await {
                            Ok(event) => {
                                let terminal = event.is_terminal();
                                yield event;
                                if terminal {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                debug!(namespace = %namespace, skipped, "Progress consumer lagging");
                            }
                            Err(RecvError::Closed) => {
                                // Channel gone without a terminal event; report the outcome
                                yield match result.await {
                                    Ok(snapshot) => ProgressEvent::ScanComplete {
                                        namespace: namespace.clone(),
                                        resource_types: snapshot.resources.len(),
                                        total_objects: snapshot.total_objects(),
                                        elapsed_ms: 0,
                                    },
                                    Err(e) => ProgressEvent::ScanFailed {
                                        namespace: namespace.clone(),
                                        message: e.to_string(),
                                    },
                                };
                                break;
                            }
                        }
                    }
                }
            }
        }
        .boxed()
    }
}
