// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::api::{ClusterApi, DiscoveryResponse, ListPage};
use super::error::ClusterError;
use super::resources::ResourceType;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Page size for paginated object listing
const PAGE_SIZE: u32 = 500;

/// Server-side timeout for metadata-only count lists, in seconds
const COUNT_SERVER_TIMEOUT_SECS: u32 = 3;

/// `ClusterApi` backed by a kube-rs client for one cluster
pub struct KubeClusterApi {
    client: Client,
    context: String,
}

impl KubeClusterApi {
    /// Connect using kubeconfig (optionally a named context), falling back to
    /// the in-cluster service account when no kubeconfig is readable
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let (mut config, context_name) = match Kubeconfig::read() {
            Ok(kubeconfig) => {
                let name = context
                    .map(String::from)
                    .or_else(|| kubeconfig.current_context.clone())
                    .unwrap_or_else(|| "default".to_string());
                let config = Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: context.map(String::from),
                        ..Default::default()
                    },
                )
                .await
                .with_context(|| format!("Failed to load kubeconfig for context '{}'", name))?;
                (config, name)
            }
            Err(e) => {
                debug!(error = %e, "No usable kubeconfig, trying in-cluster config");
                let config = Config::incluster().context("Failed to create kubernetes config")?;
                (config, "in-cluster".to_string())
            }
        };

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)
            .with_context(|| format!("Failed to create client for context '{}'", context_name))?;

        info!(context = %context_name, "Kubernetes client ready");

        Ok(Self {
            client,
            context: context_name,
        })
    }

    /// Name of the kubeconfig context in use
    pub fn context(&self) -> &str {
        &self.context
    }

    fn namespaced_api(&self, resource: &ResourceType, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &resource.api_resource())
    }

    /// Run an API call, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, kube::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if Self::is_retryable_error(&e) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                    warn!(
                        call = %what,
                        context = %self.context,
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(call = %what, context = %self.context, error = %e, "Non-retryable error");
                    return Err(e.into());
                }
            }
        }

        Err(last_error
            .map(ClusterError::from)
            .unwrap_or_else(|| ClusterError::Transport(format!("{} failed after retries", what))))
    }

    /// Check if an error is retryable (transient failures)
    fn is_retryable_error(err: &kube::Error) -> bool {
        match err {
            kube::Error::HyperError(_) | kube::Error::Service(_) => true,
            // API errors: retry on 429 (rate limit), 503 (unavailable), 504 (timeout)
            kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
            _ => false,
        }
    }

    /// Resource list for one group/version, keeping only namespaced entries
    async fn group_version_resources(
        &self,
        group: &str,
        group_version: &str,
    ) -> Result<APIResourceList, kube::Error> {
        let mut list = if group.is_empty() {
            self.client.list_core_api_resources(group_version).await?
        } else {
            self.client.list_api_group_resources(group_version).await?
        };
        list.resources.retain(|r| r.namespaced);
        Ok(list)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default();
        let list = self
            .with_retry("list namespaces", || api.list_metadata(&params))
            .await?;

        debug!(context = %self.context, count = list.items.len(), "Listed namespaces");
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn discover_preferred_resources(&self) -> Result<DiscoveryResponse, ClusterError> {
        let core = self.client.list_core_api_versions().await?;
        let groups = self.client.list_api_groups().await?;

        // (group, group/version) pairs: the core group first, then every named
        // group at its preferred version
        let mut targets: Vec<(String, String)> = Vec::new();
        if let Some(version) = core.versions.first() {
            targets.push((String::new(), version.clone()));
        }
        for group in groups.groups {
            let preferred = group
                .preferred_version
                .or_else(|| group.versions.into_iter().next());
            match preferred {
                Some(gv) => targets.push((group.name, gv.group_version)),
                None => debug!(group = %group.name, "API group has no versions, skipping"),
            }
        }

        let fetches = targets.iter().map(|(group, group_version)| async move {
            (
                group.as_str(),
                self.group_version_resources(group, group_version).await,
            )
        });

        let mut response = DiscoveryResponse::default();
        for (group, result) in join_all(fetches).await {
            match result {
                Ok(list) => response.lists.push(list),
                Err(e) => {
                    let name = if group.is_empty() { "core" } else { group };
                    debug!(group = %name, error = %e, "API group discovery failed");
                    response.failed_groups.push(name.to_string());
                }
            }
        }

        Ok(response)
    }

    async fn list_metadata_page(
        &self,
        resource: &ResourceType,
        namespace: &str,
        limit: Option<u32>,
    ) -> Result<ListPage, ClusterError> {
        let api = self.namespaced_api(resource, namespace);
        let mut params = ListParams::default().timeout(COUNT_SERVER_TIMEOUT_SECS);
        if let Some(limit) = limit {
            params = params.limit(limit);
        }

        let list = api.list_metadata(&params).await?;
        Ok(ListPage {
            item_count: list.items.len(),
            continue_token: list.metadata.continue_,
            remaining_item_count: list.metadata.remaining_item_count,
        })
    }

    /// Lists with continue tokens, page by page, retrying each page
    async fn list_objects(
        &self,
        resource: &ResourceType,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let api = self.namespaced_api(resource, namespace);
        let mut all_items: Vec<DynamicObject> = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            let mut params = ListParams::default().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let list = self
                .with_retry(&resource.full_name, || api.list(&params))
                .await?;
            all_items.extend(list.items);
            page_count += 1;

            match list.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        resource = %resource.full_name,
                        namespace = %namespace,
                        page = page_count,
                        total_so_far = all_items.len(),
                        "Fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(all_items)
    }

    async fn get_object(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        let api = self.namespaced_api(resource, namespace);
        self.with_retry(&resource.full_name, || api.get(name)).await
    }
}
