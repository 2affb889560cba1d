// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory cluster used by unit tests.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use kube::api::DynamicObject;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::api::{ClusterApi, DiscoveryResponse, ListPage};
use super::error::ClusterError;
use super::resources::ResourceType;

/// Build a discovery list from (plural, kind, namespaced) triples
pub fn resource_list(group_version: &str, resources: &[(&str, &str, bool)]) -> APIResourceList {
    APIResourceList {
        group_version: group_version.to_string(),
        resources: resources
            .iter()
            .map(|(name, kind, namespaced)| APIResource {
                name: name.to_string(),
                kind: kind.to_string(),
                namespaced: *namespaced,
                verbs: vec!["get".to_string(), "list".to_string()],
                ..Default::default()
            })
            .collect(),
    }
}

pub fn forbidden() -> ClusterError {
    ClusterError::Api {
        code: 403,
        reason: "Forbidden".to_string(),
        message: "forbidden: User cannot list resource".to_string(),
    }
}

pub fn connection_refused() -> ClusterError {
    ClusterError::Transport("connection refused".to_string())
}

/// Scriptable `ClusterApi`
///
/// Counts are per resource full name (default 0). A metadata list with a
/// limit smaller than the count returns a truncated page.
pub struct FakeCluster {
    namespaces: Vec<String>,
    discovery: Result<DiscoveryResponse, ClusterError>,
    counts: HashMap<String, usize>,
    failures: HashMap<String, ClusterError>,
    hanging: HashSet<String>,
    panicking: HashSet<String>,
    report_remaining: bool,
    count_delay: Option<Duration>,
    objects: HashMap<(String, String), Vec<DynamicObject>>,

    pub discovery_calls: AtomicUsize,
    /// (full name, limit) of every metadata list call
    pub count_calls: Mutex<Vec<(String, Option<u32>)>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            namespaces: vec!["default".to_string(), "kube-system".to_string()],
            discovery: Ok(DiscoveryResponse::default()),
            counts: HashMap::new(),
            failures: HashMap::new(),
            hanging: HashSet::new(),
            panicking: HashSet::new(),
            report_remaining: false,
            count_delay: None,
            objects: HashMap::new(),
            discovery_calls: AtomicUsize::new(0),
            count_calls: Mutex::new(Vec::new()),
        }
    }

    /// A small cluster: core pods/services/configmaps/secrets/bindings,
    /// apps deployments, a token request type and one cluster-scoped type
    pub fn standard() -> Self {
        Self::new().with_discovery(
            vec![
                resource_list(
                    "v1",
                    &[
                        ("pods", "Pod", true),
                        ("pods/log", "Pod", true),
                        ("services", "Service", true),
                        ("configmaps", "ConfigMap", true),
                        ("secrets", "Secret", true),
                        ("bindings", "Binding", true),
                        ("nodes", "Node", false),
                    ],
                ),
                resource_list("apps/v1", &[("deployments", "Deployment", true)]),
                resource_list(
                    "authentication.k8s.io/v1",
                    &[("tokenrequests", "TokenRequest", true)],
                ),
            ],
            &[],
        )
    }

    pub fn with_namespaces(mut self, namespaces: &[&str]) -> Self {
        self.namespaces = namespaces.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_discovery(mut self, lists: Vec<APIResourceList>, failed_groups: &[&str]) -> Self {
        self.discovery = Ok(DiscoveryResponse {
            lists,
            failed_groups: failed_groups.iter().map(|g| g.to_string()).collect(),
        });
        self
    }

    pub fn with_discovery_error(mut self) -> Self {
        self.discovery = Err(connection_refused());
        self
    }

    pub fn with_count(mut self, full_name: &str, count: usize) -> Self {
        self.counts.insert(full_name.to_string(), count);
        self
    }

    pub fn with_failure(mut self, full_name: &str, error: ClusterError) -> Self {
        self.failures.insert(full_name.to_string(), error);
        self
    }

    /// Metadata lists for this resource never return
    pub fn with_hang(mut self, full_name: &str) -> Self {
        self.hanging.insert(full_name.to_string());
        self
    }

    /// Metadata lists for this resource panic the calling task
    pub fn with_panic(mut self, full_name: &str) -> Self {
        self.panicking.insert(full_name.to_string());
        self
    }

    /// Truncated pages carry `remainingItemCount`
    pub fn with_remaining_count(mut self) -> Self {
        self.report_remaining = true;
        self
    }

    pub fn with_count_delay(mut self, delay: Duration) -> Self {
        self.count_delay = Some(delay);
        self
    }

    /// Objects named `names` of `resource` in `namespace`
    pub fn with_objects(mut self, namespace: &str, resource: &ResourceType, names: &[&str]) -> Self {
        let items = names
            .iter()
            .map(|name| {
                DynamicObject::new(name, &resource.api_resource())
                    .within(namespace)
                    .data(json!({
                        "spec": {"owner": name},
                        "status": {"phase": "Running"}
                    }))
            })
            .collect();
        self.objects
            .insert((namespace.to_string(), resource.full_name.clone()), items);
        self
    }

    pub fn counted_resources(&self) -> Vec<String> {
        let calls = self.count_calls.lock().unwrap();
        let mut seen = Vec::new();
        for (name, _) in calls.iter() {
            if !seen.contains(name) {
                seen.push(name.clone());
            }
        }
        seen
    }

    pub fn count_call_total(&self) -> usize {
        self.count_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.namespaces.clone())
    }

    async fn discover_preferred_resources(&self) -> Result<DiscoveryResponse, ClusterError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        self.discovery.clone()
    }

    async fn list_metadata_page(
        &self,
        resource: &ResourceType,
        _namespace: &str,
        limit: Option<u32>,
    ) -> Result<ListPage, ClusterError> {
        self.count_calls
            .lock()
            .unwrap()
            .push((resource.full_name.clone(), limit));

        if let Some(delay) = self.count_delay {
            tokio::time::sleep(delay).await;
        }
        if self.hanging.contains(&resource.full_name) {
            std::future::pending::<()>().await;
        }
        if self.panicking.contains(&resource.full_name) {
            panic!("metadata list for {} panicked", resource.full_name);
        }
        if let Some(err) = self.failures.get(&resource.full_name) {
            return Err(err.clone());
        }

        let total = self.counts.get(&resource.full_name).copied().unwrap_or(0);
        match limit {
            Some(limit) if (limit as usize) < total => Ok(ListPage {
                item_count: limit as usize,
                continue_token: Some("next-page".to_string()),
                remaining_item_count: self
                    .report_remaining
                    .then(|| (total - limit as usize) as i64),
            }),
            _ => Ok(ListPage {
                item_count: total,
                ..Default::default()
            }),
        }
    }

    async fn list_objects(
        &self,
        resource: &ResourceType,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        if let Some(err) = self.failures.get(&resource.full_name) {
            return Err(err.clone());
        }
        Ok(self
            .objects
            .get(&(namespace.to_string(), resource.full_name.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_object(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        self.objects
            .get(&(namespace.to_string(), resource.full_name.clone()))
            .and_then(|items| {
                items
                    .iter()
                    .find(|o| o.metadata.name.as_deref() == Some(name))
                    .cloned()
            })
            .ok_or_else(|| ClusterError::Api {
                code: 404,
                reason: "NotFound".to_string(),
                message: format!("{} \"{}\" not found", resource.name, name),
            })
    }
}
