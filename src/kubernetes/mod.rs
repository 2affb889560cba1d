// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod api;
pub mod cache;
mod client;
mod counter;
pub mod discovery;
mod error;
mod explorer;
pub mod resources;

#[cfg(test)]
mod testing;

pub use cache::{CacheSettings, CacheStatus, DEFAULT_SKIP_RESOURCES};
pub use error::ExplorerError;
pub use explorer::Explorer;
pub use resources::{NamespaceResources, ObjectSummary, ResourceFilters};
