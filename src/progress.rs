// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for namespace scans
//!
//! A scan reports milestones through a broadcast channel. Sending never
//! blocks the scan: receivers that fall behind skip events, and receivers
//! that go away simply stop receiving.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress event for one namespace
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A fresh scan began
    ScanStarted { namespace: String },
    /// Resource types to count are known
    CatalogResolved {
        namespace: String,
        resource_types: usize,
        failed_groups: usize,
    },
    /// One resource type was counted (throttled)
    ResourceCounted {
        namespace: String,
        resource: String,
        count: usize,
        processed: usize,
        total: usize,
    },
    ScanComplete {
        namespace: String,
        resource_types: usize,
        total_objects: usize,
        elapsed_ms: u64,
    },
    ScanFailed { namespace: String, message: String },
    /// Served from cache, no scan needed
    UsingCache {
        namespace: String,
        resource_types: usize,
        age_secs: u64,
    },
}

impl ProgressEvent {
    /// No further events follow a terminal one
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::ScanComplete { .. }
                | ProgressEvent::ScanFailed { .. }
                | ProgressEvent::UsingCache { .. }
        )
    }

    pub fn namespace(&self) -> &str {
        match self {
            ProgressEvent::ScanStarted { namespace }
            | ProgressEvent::CatalogResolved { namespace, .. }
            | ProgressEvent::ResourceCounted { namespace, .. }
            | ProgressEvent::ScanComplete { namespace, .. }
            | ProgressEvent::ScanFailed { namespace, .. }
            | ProgressEvent::UsingCache { namespace, .. } => namespace,
        }
    }

    /// One-line human description, used for spinner messages
    pub fn describe(&self) -> String {
        match self {
            ProgressEvent::ScanStarted { namespace } => {
                format!("Scanning namespace {}...", namespace)
            }
            ProgressEvent::CatalogResolved {
                resource_types,
                failed_groups,
                ..
            } => {
                if *failed_groups > 0 {
                    format!(
                        "Counting {} resource types ({} API groups unavailable)...",
                        resource_types, failed_groups
                    )
                } else {
                    format!("Counting {} resource types...", resource_types)
                }
            }
            ProgressEvent::ResourceCounted {
                resource,
                count,
                processed,
                total,
                ..
            } => format!("[{}/{}] {}: {}", processed, total, resource, count),
            ProgressEvent::ScanComplete {
                resource_types,
                total_objects,
                elapsed_ms,
                ..
            } => format!(
                "Found {} objects across {} resource types in {}ms",
                total_objects, resource_types, elapsed_ms
            ),
            ProgressEvent::ScanFailed { message, .. } => format!("Scan failed: {}", message),
            ProgressEvent::UsingCache {
                resource_types,
                age_secs,
                ..
            } => format!(
                "Using cached data ({} resource types, {}s old)",
                resource_types, age_secs
            ),
        }
    }
}

/// Reporting options, fixed at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressSettings {
    /// Report every counted resource type
    pub verbose: bool,
    /// Otherwise report every Nth resource type (plus any with objects)
    pub every: usize,
    /// Broadcast channel capacity per scan
    pub buffer: usize,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            every: 10,
            buffer: 100,
        }
    }
}

/// Progress reporter for one scan
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressEvent>,
    namespace: String,
    settings: ProgressSettings,
    started: Instant,
    /// Resource types to count in this scan
    total: AtomicUsize,
    /// Resource types counted so far
    processed: AtomicUsize,
}

impl ProgressReporter {
    pub fn new(
        namespace: &str,
        sender: broadcast::Sender<ProgressEvent>,
        settings: ProgressSettings,
    ) -> Self {
        Self {
            sender,
            namespace: namespace.to_string(),
            settings,
            started: Instant::now(),
            total: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn scan_started(&self) {
        self.emit(ProgressEvent::ScanStarted {
            namespace: self.namespace.clone(),
        });
    }

    pub fn catalog_resolved(&self, resource_types: usize, failed_groups: usize) {
        self.total.store(resource_types, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
        self.emit(ProgressEvent::CatalogResolved {
            namespace: self.namespace.clone(),
            resource_types,
            failed_groups,
        });
    }

    /// Record one counted resource type, emitting an event when due
    pub fn resource_counted(&self, resource: &str, count: usize) {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.load(Ordering::SeqCst);

        let due = self.settings.verbose
            || count > 0
            || (self.settings.every > 0 && processed % self.settings.every == 0)
            || processed >= total;
        if !due {
            return;
        }

        self.emit(ProgressEvent::ResourceCounted {
            namespace: self.namespace.clone(),
            resource: resource.to_string(),
            count,
            processed,
            total,
        });
    }

    pub fn scan_complete(&self, resource_types: usize, total_objects: usize) {
        self.emit(ProgressEvent::ScanComplete {
            namespace: self.namespace.clone(),
            resource_types,
            total_objects,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
    }

    pub fn scan_failed(&self, message: &str) {
        self.emit(ProgressEvent::ScanFailed {
            namespace: self.namespace.clone(),
            message: message.to_string(),
        });
    }

    /// Get current progress (done/total)
    pub fn progress(&self) -> (usize, usize) {
        (
            self.processed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }
}
