// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
pub mod repl;

pub use args::{Args, Command, OutputFormat};

use crate::kubernetes::ExplorerError;

/// Exit status when the cluster cannot be used (sysexits EX_UNAVAILABLE)
pub const EXIT_UNAVAILABLE: i32 = 69;

/// The explorer error behind `err` when it means the cluster is unavailable
pub fn cluster_unavailable(err: &anyhow::Error) -> Option<&ExplorerError> {
    err.chain()
        .find_map(|e| e.downcast_ref::<ExplorerError>())
        .filter(|e| e.is_unavailable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn wrap(err: ExplorerError) -> anyhow::Error {
        Err::<(), _>(err).context("loading resources").unwrap_err()
    }

    #[test]
    fn test_cluster_unavailable() {
        assert!(cluster_unavailable(&anyhow::Error::new(ExplorerError::Unavailable)).is_some());
        assert!(cluster_unavailable(&wrap(ExplorerError::Unavailable)).is_some());
        assert!(cluster_unavailable(&wrap(ExplorerError::UnknownResource("foo".into()))).is_none());
        assert!(cluster_unavailable(&anyhow::anyhow!("unrelated")).is_none());
    }
}
