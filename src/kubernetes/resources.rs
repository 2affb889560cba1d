// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource types, counted resource types and object views.

use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde::Serialize;
use std::collections::BTreeMap;

/// Unique key of a resource across API groups ("pods", "deployments.apps")
pub fn full_name(name: &str, group: &str) -> String {
    if group.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, group)
    }
}

/// Human label of a resource ("pods", "deployments (apps)")
pub fn display_name(name: &str, group: &str) -> String {
    if group.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, group)
    }
}

/// One discoverable API resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    /// Plural, lowercase name (e.g., "pods")
    pub name: String,
    pub full_name: String,
    pub display_name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// API group, empty for the core group
    pub api_group: String,
    pub api_version: String,
    pub namespaced: bool,
}

impl ResourceType {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        let name = name.into();
        let api_group = group.into();
        Self {
            full_name: full_name(&name, &api_group),
            display_name: display_name(&name, &api_group),
            name,
            kind: kind.into(),
            short_name: None,
            api_group,
            api_version: version.into(),
            namespaced,
        }
    }

    pub fn with_short_name(mut self, short_name: Option<String>) -> Self {
        self.short_name = short_name;
        self
    }

    /// Group/version string as used in `apiVersion` ("v1", "apps/v1")
    pub fn group_version(&self) -> String {
        if self.api_group.is_empty() {
            self.api_version.clone()
        } else {
            format!("{}/{}", self.api_group, self.api_version)
        }
    }

    /// Group label for display, with the empty group shown as "core"
    pub fn group_label(&self) -> &str {
        if self.api_group.is_empty() {
            "core"
        } else {
            &self.api_group
        }
    }

    /// kube-rs handle for dynamic API calls against this resource
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.api_group.clone(),
            version: self.api_version.clone(),
            api_version: self.group_version(),
            kind: self.kind.clone(),
            plural: self.name.clone(),
        }
    }
}

/// A resource type with its observed object count in one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountedResourceType {
    #[serde(flatten)]
    pub resource: ResourceType,
    pub count: usize,
}

/// Filters applied to a namespace's counted resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilters {
    /// Case-insensitive substring of the resource name or kind
    pub search: Option<String>,
    /// Drop resource types with no objects
    pub populated_only: bool,
    /// Exact API group; "core" selects the empty group
    pub api_group: Option<String>,
}

impl ResourceFilters {
    pub fn matches(&self, item: &CountedResourceType) -> bool {
        if self.populated_only && item.count == 0 {
            return false;
        }

        if let Some(group) = self.api_group.as_deref().filter(|g| !g.is_empty()) {
            let wanted = if group == "core" { "" } else { group };
            if item.resource.api_group != wanted {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let search = search.to_lowercase();
            if !item.resource.name.to_lowercase().contains(&search)
                && !item.resource.kind.to_lowercase().contains(&search)
            {
                return false;
            }
        }

        true
    }

    /// Keep matching items, preserving order
    pub fn apply(&self, items: &[CountedResourceType]) -> Vec<CountedResourceType> {
        items.iter().filter(|i| self.matches(i)).cloned().collect()
    }
}

/// Filtered view of one namespace's resources
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceResources {
    pub namespace: String,
    pub resources: Vec<CountedResourceType>,
    /// Objects across every counted resource type, before filtering
    pub total_objects: usize,
    /// Number of counted resource types, before filtering
    pub discovered: usize,
    /// API groups whose resource types are missing from this view
    pub failed_groups: Vec<String>,
    /// Only the built-in resource types were counted
    pub fallback: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl NamespaceResources {
    /// The `n` resource types with the most objects, highest first
    pub fn top(&self, n: usize) -> Vec<&CountedResourceType> {
        let mut sorted: Vec<_> = self.resources.iter().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted.truncate(n);
        sorted
    }

    /// Warning line when discovery was incomplete
    pub fn discovery_notice(&self) -> Option<String> {
        if self.fallback {
            Some(format!(
                "Resource discovery failed; showing {} built-in resource types only",
                self.discovered
            ))
        } else if !self.failed_groups.is_empty() {
            Some(format!(
                "{} API group(s) unavailable, their resource types are missing: {}",
                self.failed_groups.len(),
                self.failed_groups.join(", ")
            ))
        } else {
            None
        }
    }
}

/// Summary of one object, as listed per resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub kind: String,
    pub api_version: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectSummary {
    /// Build from a dynamic object; list items carry no type meta, so the
    /// resource type supplies `kind` and `apiVersion` in that case
    pub fn from_object(obj: &DynamicObject, resource: &ResourceType) -> Self {
        let (kind, api_version) = match &obj.types {
            Some(types) => (types.kind.clone(), types.api_version.clone()),
            None => (resource.kind.clone(), resource.group_version()),
        };
        let meta = &obj.metadata;

        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            kind,
            api_version,
            creation_timestamp: meta.creation_timestamp.as_ref().map(|t| t.0),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        }
    }
}

/// Object summary plus its spec and status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDetail {
    #[serde(flatten)]
    pub summary: ObjectSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl ObjectDetail {
    pub fn from_object(obj: &DynamicObject, resource: &ResourceType) -> Self {
        let field = |key: &str| obj.data.get(key).filter(|v| v.is_object()).cloned();
        Self {
            summary: ObjectSummary::from_object(obj, resource),
            spec: field("spec"),
            status: field("status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counted(name: &str, kind: &str, group: &str, count: usize) -> CountedResourceType {
        CountedResourceType {
            resource: ResourceType::new(name, kind, group, "v1", true),
            count,
        }
    }

    #[test]
    fn test_full_name_core_group() {
        let pods = ResourceType::new("pods", "Pod", "", "v1", true);
        assert_eq!(pods.full_name, "pods");
        assert_eq!(pods.display_name, "pods");
        assert_eq!(pods.group_version(), "v1");
        assert_eq!(pods.group_label(), "core");
    }

    #[test]
    fn test_full_name_named_group() {
        let deploy = ResourceType::new("deployments", "Deployment", "apps", "v1", true);
        assert_eq!(deploy.full_name, "deployments.apps");
        assert_eq!(deploy.display_name, "deployments (apps)");
        assert_eq!(deploy.group_version(), "apps/v1");
        assert_eq!(deploy.group_label(), "apps");
    }

    #[test]
    fn test_api_resource() {
        let cert = ResourceType::new("certificates", "Certificate", "cert-manager.io", "v1", true);
        let ar = cert.api_resource();
        assert_eq!(ar.plural, "certificates");
        assert_eq!(ar.api_version, "cert-manager.io/v1");
        assert_eq!(ar.kind, "Certificate");
    }

    #[test]
    fn test_populated_only_filter() {
        let items = vec![
            counted("pods", "Pod", "", 3),
            counted("secrets", "Secret", "", 0),
            counted("configmaps", "ConfigMap", "", 1),
        ];
        let filters = ResourceFilters {
            populated_only: true,
            ..Default::default()
        };
        let kept = filters.apply(&items);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|i| i.count > 0));
        assert_eq!(kept[0].resource.name, "pods");
        assert_eq!(kept[1].resource.name, "configmaps");
    }

    #[test]
    fn test_search_matches_name_or_kind() {
        let items = vec![
            counted("pods", "Pod", "", 1),
            counted("endpointslices", "EndpointSlice", "discovery.k8s.io", 1),
            counted("services", "Service", "", 1),
        ];
        let filters = ResourceFilters {
            search: Some("SLICE".to_string()),
            ..Default::default()
        };
        let kept = filters.apply(&items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].resource.name, "endpointslices");
    }

    #[test]
    fn test_api_group_filter() {
        let items = vec![
            counted("pods", "Pod", "", 1),
            counted("deployments", "Deployment", "apps", 1),
        ];
        let apps = ResourceFilters {
            api_group: Some("apps".to_string()),
            ..Default::default()
        };
        assert_eq!(apps.apply(&items)[0].resource.name, "deployments");

        let core = ResourceFilters {
            api_group: Some("core".to_string()),
            ..Default::default()
        };
        let kept = core.apply(&items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].resource.name, "pods");
    }

    #[test]
    fn test_top_sorts_by_count() {
        let view = NamespaceResources {
            namespace: "default".to_string(),
            resources: vec![
                counted("pods", "Pod", "", 2),
                counted("secrets", "Secret", "", 9),
                counted("configmaps", "ConfigMap", "", 5),
            ],
            total_objects: 16,
            discovered: 3,
            failed_groups: Vec::new(),
            fallback: false,
            refreshed_at: Utc::now(),
        };
        let top: Vec<_> = view.top(2).iter().map(|r| r.resource.name.as_str()).collect();
        assert_eq!(top, vec!["secrets", "configmaps"]);
        // Cache order is untouched
        assert_eq!(view.resources[0].resource.name, "pods");
        assert_eq!(view.discovery_notice(), None);
    }

    #[test]
    fn test_discovery_notice() {
        let mut view = NamespaceResources {
            namespace: "default".to_string(),
            resources: vec![counted("pods", "Pod", "", 2)],
            total_objects: 2,
            discovered: 1,
            failed_groups: vec!["metrics.k8s.io/v1beta1".to_string()],
            fallback: false,
            refreshed_at: Utc::now(),
        };
        let notice = view.discovery_notice().unwrap();
        assert!(notice.starts_with("1 API group(s) unavailable"));
        assert!(notice.contains("metrics.k8s.io/v1beta1"));

        view.fallback = true;
        view.discovered = 5;
        let notice = view.discovery_notice().unwrap();
        assert!(notice.contains("5 built-in resource types"));
    }

    #[test]
    fn test_object_summary_defaults_type_meta() {
        let pods = ResourceType::new("pods", "Pod", "", "v1", true);
        let mut obj = DynamicObject::new("web-0", &pods.api_resource()).within("default");
        obj.types = None;
        obj.metadata.labels = Some(BTreeMap::from([("app".to_string(), "web".to_string())]));

        let summary = ObjectSummary::from_object(&obj, &pods);
        assert_eq!(summary.name, "web-0");
        assert_eq!(summary.namespace.as_deref(), Some("default"));
        assert_eq!(summary.kind, "Pod");
        assert_eq!(summary.api_version, "v1");
        assert_eq!(summary.labels.get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_object_detail_spec_and_status() {
        let deploy = ResourceType::new("deployments", "Deployment", "apps", "v1", true);
        let obj = DynamicObject::new("api", &deploy.api_resource())
            .within("prod")
            .data(json!({
                "spec": {"replicas": 3},
                "status": {"readyReplicas": 2}
            }));

        let detail = ObjectDetail::from_object(&obj, &deploy);
        assert_eq!(detail.summary.api_version, "apps/v1");
        assert_eq!(detail.spec, Some(json!({"replicas": 3})));
        assert_eq!(detail.status, Some(json!({"readyReplicas": 2})));
    }

    #[test]
    fn test_object_summary_creation_timestamp() {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

        let pods = ResourceType::new("pods", "Pod", "", "v1", true);
        let created = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut obj = DynamicObject::new("web-0", &pods.api_resource()).within("default");
        obj.metadata.creation_timestamp = Some(Time(created));

        let summary = ObjectSummary::from_object(&obj, &pods);
        assert_eq!(summary.creation_timestamp, Some(created));

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["creationTimestamp"], "2024-05-01T10:00:00Z");
    }
}
