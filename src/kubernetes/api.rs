// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The slice of the Kubernetes API the explorer consumes.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::DynamicObject;

use super::error::ClusterError;
use super::resources::ResourceType;

/// Preferred namespaced resource lists, one per group/version
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResponse {
    pub lists: Vec<APIResourceList>,
    /// API groups whose resource list could not be fetched
    pub failed_groups: Vec<String>,
}

/// One page of a metadata-only list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub item_count: usize,
    pub continue_token: Option<String>,
    pub remaining_item_count: Option<i64>,
}

impl ListPage {
    /// Whether the server truncated the result
    pub fn is_truncated(&self) -> bool {
        self.continue_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Cluster operations used by the catalog, the counter and the explorer
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Namespace names, in server order
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    /// Preferred namespaced resources of every API group.
    ///
    /// Groups that fail are reported in `failed_groups`; an `Err` means
    /// discovery could not run at all.
    async fn discover_preferred_resources(&self) -> Result<DiscoveryResponse, ClusterError>;

    /// Metadata-only list; `limit = None` lists everything
    async fn list_metadata_page(
        &self,
        resource: &ResourceType,
        namespace: &str,
        limit: Option<u32>,
    ) -> Result<ListPage, ClusterError>;

    /// Every object of a resource type in a namespace
    async fn list_objects(
        &self,
        resource: &ResourceType,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError>;

    async fn get_object(
        &self,
        resource: &ResourceType,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClusterError>;
}

/// Split "apps/v1" into ("apps", "v1") and "v1" into ("", "v1")
pub fn parse_group_version(group_version: &str) -> Option<(&str, &str)> {
    match group_version.split_once('/') {
        None if !group_version.is_empty() => Some(("", group_version)),
        Some((group, version)) if !group.is_empty() && !version.is_empty() && !version.contains('/') => {
            Some((group, version))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_version() {
        assert_eq!(parse_group_version("v1"), Some(("", "v1")));
        assert_eq!(parse_group_version("apps/v1"), Some(("apps", "v1")));
        assert_eq!(
            parse_group_version("networking.k8s.io/v1"),
            Some(("networking.k8s.io", "v1"))
        );
    }

    #[test]
    fn test_parse_group_version_invalid() {
        assert_eq!(parse_group_version(""), None);
        assert_eq!(parse_group_version("a/b/c"), None);
        assert_eq!(parse_group_version("/v1"), None);
        assert_eq!(parse_group_version("apps/"), None);
    }

    #[test]
    fn test_list_page_truncation() {
        let page = ListPage {
            item_count: 1,
            continue_token: Some("abc".to_string()),
            remaining_item_count: None,
        };
        assert!(page.is_truncated());

        let empty_token = ListPage {
            continue_token: Some(String::new()),
            ..Default::default()
        };
        assert!(!empty_token.is_truncated());
        assert!(!ListPage::default().is_truncated());
    }
}
