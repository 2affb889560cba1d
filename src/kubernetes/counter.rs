// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Live object counts for one resource type in one namespace.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::api::ClusterApi;
use super::error::{ClusterError, CountError};
use super::resources::ResourceType;

/// Counts objects with metadata-only list calls under a per-count time budget
pub struct ObjectCounter {
    api: Arc<dyn ClusterApi>,
    timeout: Duration,
    page_size: u32,
    expected_denials: Vec<u16>,
}

impl ObjectCounter {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        timeout: Duration,
        page_size: u32,
        expected_denials: Vec<u16>,
    ) -> Self {
        Self {
            api,
            timeout,
            page_size: page_size.max(1),
            expected_denials,
        }
    }

    /// Number of objects of `resource` in `namespace`.
    ///
    /// Expected denials (by HTTP status) resolve to 0. The time budget covers
    /// the first page and the follow-up list together.
    pub async fn count(&self, namespace: &str, resource: &ResourceType) -> Result<usize, CountError> {
        let result = match tokio::time::timeout(self.timeout, self.list_count(namespace, resource)).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout(self.timeout)),
        };

        match result {
            Ok(count) => Ok(count),
            Err(e) if e.has_status(&self.expected_denials) => {
                debug!(
                    resource = %resource.full_name,
                    namespace = %namespace,
                    error = %e,
                    "Listing not permitted, counting as zero"
                );
                Ok(0)
            }
            Err(source) => Err(CountError {
                resource: resource.full_name.clone(),
                namespace: namespace.to_string(),
                source,
            }),
        }
    }

    async fn list_count(&self, namespace: &str, resource: &ResourceType) -> Result<usize, ClusterError> {
        let page = self
            .api
            .list_metadata_page(resource, namespace, Some(self.page_size))
            .await?;

        if !page.is_truncated() {
            return Ok(page.item_count);
        }

        if let Some(remaining) = page.remaining_item_count.filter(|r| *r >= 0) {
            return Ok(page.item_count + remaining as usize);
        }

        // Truncated without a remaining count: list everything once
        let full = self.api.list_metadata_page(resource, namespace, None).await?;
        Ok(full.item_count)
    }
}
