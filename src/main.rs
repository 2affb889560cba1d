// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod kubernetes;
mod output;
pub mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::prelude::*;

use cli::{Args, Command, OutputFormat};
use config::Config;
use kubernetes::{Explorer, ResourceFilters};

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool, to_stderr: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    // Create log directory
    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // File appender with size-based rotation:
    // - Max 10MB per file
    // - Keep up to 5 files (total max ~50MB)
    // - Also rotate daily
    let log_path = log_dir.join("k8s-explorer.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024); // 10MB

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    // Use non-blocking writer for better performance
    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose {
        "k8s_explorer=debug"
    } else {
        "k8s_explorer=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // File layer (always enabled)
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if to_stderr && verbose {
        // Both file and stderr output
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        // File only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs); fails only if one is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = Args::parse();

    // Initialize logging
    // - Always log to file (~/.k8s-explorer/log/k8s-explorer.log)
    // - For batch commands with -v, also log to stderr
    init_logging(args.verbose, args.is_batch());

    let mut config = Config::load()?;
    args.apply_overrides(&mut config);

    if args.command == Some(Command::SaveConfig) {
        config.save()?;
        println!("Saved configuration to {}", Config::config_path()?.display());
        return Ok(());
    }

    let explorer = Explorer::connect(&config, args.context.as_deref()).await;

    let result = match &args.command {
        None | Some(Command::Interactive) => cli::repl::run_repl(explorer).await,
        Some(command) => run_batch(&explorer, command, &args).await,
    };

    if let Err(e) = &result
        && let Some(unavailable) = cli::cluster_unavailable(e)
    {
        eprintln!("Cluster unavailable: {}", unavailable);
        eprintln!("Check the kubeconfig context and that the API server is reachable");
        std::process::exit(cli::EXIT_UNAVAILABLE);
    }
    result
}

/// Incomplete discovery goes to stderr so stdout stays parseable
fn warn_discovery(view: &kubernetes::NamespaceResources) {
    if let Some(notice) = view.discovery_notice() {
        eprintln!("Warning: {}", notice);
    }
}

async fn run_batch(explorer: &Explorer, command: &Command, args: &Args) -> Result<()> {
    let format = &args.output;

    match command {
        Command::Interactive | Command::SaveConfig => Ok(()),
        Command::Namespaces => {
            let namespaces = explorer.list_namespaces().await?;
            let out = output::render(
                &namespaces,
                || output::namespaces_table(&namespaces),
                format,
                args.no_headers,
            )?;
            println!("{}", out);
            Ok(())
        }
        Command::Resources {
            namespace,
            search,
            populated,
            api_group,
            top,
        } => {
            let filters = ResourceFilters {
                search: search.clone(),
                populated_only: *populated,
                api_group: api_group.clone(),
            };
            let view = cli::repl::load_resources(explorer, namespace, &filters).await?;
            warn_discovery(&view);
            let out = output::render(
                &view,
                || output::resources_table(&view, *top),
                format,
                args.no_headers,
            )?;
            println!("{}", out);
            Ok(())
        }
        Command::Export { namespace, file } => {
            let view = cli::repl::load_resources(explorer, namespace, &ResourceFilters::default()).await?;
            warn_discovery(&view);
            let csv = output::export_table(&view).format(&OutputFormat::Csv, false);
            match file {
                Some(path) => std::fs::write(path, csv + "\n")
                    .with_context(|| format!("Failed to write export to {}", path.display()))?,
                None => println!("{}", csv),
            }
            Ok(())
        }
        Command::Objects { namespace, resource } => {
            let objects = explorer.get_resource_objects(namespace, resource).await?;
            let out = output::render(
                &objects,
                || output::objects_table(&objects),
                format,
                args.no_headers,
            )?;
            println!("{}", out);
            Ok(())
        }
        Command::Get {
            namespace,
            resource,
            name,
        } => {
            let detail = explorer.get_object(namespace, resource, name).await?;
            println!("{}", output::format_document(&detail, format)?.trim_end());
            Ok(())
        }
        Command::Raw {
            namespace,
            resource,
            name,
        } => {
            let raw = explorer.get_raw_object(namespace, resource, name).await?;
            println!("{}", output::format_document(&raw, format)?.trim_end());
            Ok(())
        }
        Command::Watch { namespace } => {
            let mut events = explorer.stream_progress(namespace);
            while let Some(event) = events.next().await {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}
