// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "k8s-explorer")]
#[command(author, version, about = "Explore Kubernetes namespaces and the resources they contain")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Kubernetes context to use (defaults to the kubeconfig current context)
    #[arg(short, long, value_name = "CONTEXT", global = true)]
    pub context: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long, global = true)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Resource catalog lifetime in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub catalog_ttl: Option<u64>,

    /// Namespace cache lifetime in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub namespace_ttl: Option<u64>,

    /// Time budget for counting one resource type, in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub count_timeout: Option<u64>,

    /// Resource types counted concurrently
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Resource names never counted (comma-separated, replaces the configured list)
    #[arg(long, value_name = "RESOURCES", value_delimiter = ',', global = true)]
    pub skip: Option<Vec<String>>,

    /// Report progress for every counted resource type
    #[arg(long, global = true)]
    pub verbose_progress: bool,
}

impl Args {
    /// Apply command line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ttl) = self.catalog_ttl {
            config.catalog_ttl_secs = ttl;
        }
        if let Some(ttl) = self.namespace_ttl {
            config.namespace_ttl_secs = ttl;
        }
        if let Some(timeout) = self.count_timeout {
            config.count_timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.count_concurrency = concurrency;
        }
        if let Some(skip) = &self.skip {
            config.skip_resources = skip.clone();
        }
        if self.verbose_progress {
            config.verbose_progress = true;
        }
    }

    /// Commands that print results and exit
    pub fn is_batch(&self) -> bool {
        !matches!(self.command, None | Some(Command::Interactive))
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start interactive REPL mode
    Interactive,

    /// List namespaces
    Namespaces,

    /// List resource types of a namespace with object counts
    Resources {
        namespace: String,

        /// Only resource types whose name or kind contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only resource types with at least one object
        #[arg(short, long)]
        populated: bool,

        /// Only this API group ("core" for the core group)
        #[arg(short = 'g', long)]
        api_group: Option<String>,

        /// Show the N resource types with the most objects
        #[arg(long, value_name = "N")]
        top: Option<usize>,
    },

    /// Export a namespace's resource types and counts as CSV
    Export {
        namespace: String,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// List objects of one resource type
    Objects {
        namespace: String,
        /// Resource full name (deployments.apps) or plural name (pods)
        resource: String,
    },

    /// Show one object: metadata, spec and status
    Get {
        namespace: String,
        resource: String,
        name: String,
    },

    /// Show one object exactly as the API server returns it
    Raw {
        namespace: String,
        resource: String,
        name: String,
    },

    /// Stream scan progress for a namespace as JSON lines
    Watch { namespace: String },

    /// Write the effective settings (config file plus flags) to the config file
    SaveConfig,
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
}
