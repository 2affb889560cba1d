// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::{Style, style};
use futures::StreamExt;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow;
use std::time::Instant;

use crate::cli;
use crate::config;
use crate::kubernetes::{Explorer, NamespaceResources, ResourceFilters};
use crate::output::{self, TableData};
use crate::progress::create_spinner;

const COMMANDS: &[&str] = &[
    "use", "namespaces", "resources", "objects", "get", "raw", "clear-cache", "status", "help", "quit",
];

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Use(String),
    Namespaces,
    Resources {
        filters: ResourceFilters,
        top: Option<usize>,
    },
    Objects { resource: String },
    Get { resource: String, name: String },
    Raw { resource: String, name: String },
    ClearCache,
    Status,
    Help,
    ClearScreen,
    Quit,
}

impl ReplCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let Some(cmd) = words.next() else {
            bail!("empty command");
        };
        let rest: Vec<&str> = words.collect();

        let command = match (cmd.to_lowercase().as_str(), rest.as_slice()) {
            ("quit" | "exit" | "\\q", []) => ReplCommand::Quit,
            ("help" | "\\?", []) => ReplCommand::Help,
            ("clear" | "\\c", []) => ReplCommand::ClearScreen,
            ("namespaces" | "ns", []) => ReplCommand::Namespaces,
            ("use", [namespace]) => ReplCommand::Use(namespace.to_string()),
            ("clear-cache", []) => ReplCommand::ClearCache,
            ("status", []) => ReplCommand::Status,
            ("resources" | "res", args) => Self::parse_resources(args)?,
            ("objects" | "ls", [resource]) => ReplCommand::Objects {
                resource: resource.to_string(),
            },
            ("get", [resource, name]) => ReplCommand::Get {
                resource: resource.to_string(),
                name: name.to_string(),
            },
            ("raw", [resource, name]) => ReplCommand::Raw {
                resource: resource.to_string(),
                name: name.to_string(),
            },
            ("use" | "objects" | "ls" | "get" | "raw", _) => {
                bail!("wrong number of arguments for '{}', see 'help'", cmd)
            }
            _ => bail!("unknown command '{}', see 'help'", cmd),
        };
        Ok(command)
    }

    /// `resources [SEARCH] [-p|--populated] [-g|--group GROUP] [--top N]`
    fn parse_resources(args: &[&str]) -> Result<Self> {
        let mut filters = ResourceFilters::default();
        let mut top = None;
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            match *arg {
                "-p" | "--populated" => filters.populated_only = true,
                "-g" | "--group" => match args.next() {
                    Some(group) => filters.api_group = Some(group.to_string()),
                    None => bail!("{} needs an API group", arg),
                },
                "--top" => match args.next().map(|n| n.parse::<usize>()) {
                    Some(Ok(n)) => top = Some(n),
                    _ => bail!("--top needs a number"),
                },
                flag if flag.starts_with('-') => bail!("unknown option '{}'", flag),
                search if filters.search.is_none() => filters.search = Some(search.to_string()),
                extra => bail!("unexpected argument '{}'", extra),
            }
        }

        Ok(ReplCommand::Resources { filters, top })
    }
}

struct ExplorerHelper;

impl Helper for ExplorerHelper {}

impl Hinter for ExplorerHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Validator for ExplorerHelper {
    fn validate(&self, _ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

impl Completer for ExplorerHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];

        // Only the command word is completed
        if line_to_cursor.contains(char::is_whitespace) {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Highlighter for ExplorerHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        let word_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let word = &trimmed[..word_end];

        if COMMANDS.contains(&word.to_lowercase().as_str()) {
            Cow::Owned(format!(
                "{}\x1b[1;34m{}\x1b[0m{}",
                &line[..indent],
                word,
                &trimmed[word_end..]
            ))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Owned(format!("\x1b[1;32m{}\x1b[0m", prompt))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn format_table(data: &TableData) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    // Header row with styling
    let header_cells: Vec<Cell> = data
        .columns
        .iter()
        .map(|col| Cell::new(col).fg(Color::Yellow))
        .collect();
    table.set_header(header_cells);

    // Data rows
    for row in &data.rows {
        let cells: Vec<Cell> = row.iter().map(Cell::new).collect();
        table.add_row(cells);
    }

    table.to_string()
}

fn print_table(data: &TableData, start: Instant) {
    if data.is_empty() {
        println!("{}", style("(no items)").dim());
        return;
    }
    println!("{}", format_table(data));
    println!(
        "{}",
        style(format!(
            "{} item{} ({:.2}s)",
            data.rows.len(),
            if data.rows.len() == 1 { "" } else { "s" },
            start.elapsed().as_secs_f64()
        ))
        .dim()
    );
}

fn print_welcome(explorer: &Explorer) {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "{} {} - Explore Kubernetes namespaces",
        style("k8s-explorer").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "{}",
        style("Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>").dim()
    );
    match explorer.context() {
        Some(context) => println!("{} {}", style("Context:").dim(), style(context).cyan()),
        None => println!(
            "{}",
            style("Not connected to a cluster; cluster commands are unavailable").yellow()
        ),
    }
    println!("{}", style("Type 'help' for commands, Ctrl+D to exit").dim());
    println!();
}

fn print_help() {
    let help_style = Style::new().cyan();
    let cmd_style = Style::new().yellow();

    println!("{}", help_style.apply_to("Commands:"));
    println!("  {}  - Switch the current namespace", cmd_style.apply_to("use <namespace>"));
    println!("  {}  - List namespaces", cmd_style.apply_to("namespaces"));
    println!(
        "  {}  - Resource types and object counts",
        cmd_style.apply_to("resources [search] [-p] [-g <group>] [--top N]")
    );
    println!("  {}  - List objects of a resource type", cmd_style.apply_to("objects <resource>"));
    println!("  {}  - Show an object's metadata, spec and status", cmd_style.apply_to("get <resource> <name>"));
    println!("  {}  - Show an object as returned by the API", cmd_style.apply_to("raw <resource> <name>"));
    println!("  {}  - Drop all cached discovery and counts", cmd_style.apply_to("clear-cache"));
    println!("  {}  - Show cache state", cmd_style.apply_to("status"));
    println!();
    println!("{}", help_style.apply_to("Examples:"));
    println!("  {} - Only resource types with objects", cmd_style.apply_to("resources -p"));
    println!("  {} - Core group resource types matching 'config'", cmd_style.apply_to("resources config -g core"));
    println!("  {} - Resource type by full name", cmd_style.apply_to("objects deployments.apps"));
    println!();
    println!("{}", help_style.apply_to("Shortcuts:"));
    println!("  {} - namespaces", cmd_style.apply_to("ns"));
    println!("  {} - objects <resource>", cmd_style.apply_to("ls <resource>"));
    println!("  {} - Quit", cmd_style.apply_to("\\q"));
    println!();
}

/// Namespace resources with a spinner following the scan's progress events
pub async fn load_resources(
    explorer: &Explorer,
    namespace: &str,
    filters: &ResourceFilters,
) -> Result<NamespaceResources> {
    let spinner = create_spinner(&format!("Loading resources in {}...", namespace));
    let mut progress = explorer.stream_progress(namespace);
    let mut fetch = Box::pin(explorer.get_namespace_resources(namespace, filters));

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = progress.next() => {
                spinner.set_message(event.describe());
            }
            result = &mut fetch => {
                break result;
            }
        }
    };

    spinner.finish_and_clear();
    Ok(result?)
}

async fn execute(explorer: &Explorer, namespace: &mut String, command: ReplCommand) -> Result<()> {
    let start = Instant::now();

    match command {
        ReplCommand::Use(ns) => {
            *namespace = ns;
            println!("{} {}", style("Namespace:").dim(), style(namespace.as_str()).cyan());
        }
        ReplCommand::Namespaces => {
            let namespaces = explorer.list_namespaces().await?;
            print_table(&output::namespaces_table(&namespaces), start);
        }
        ReplCommand::Resources { filters, top } => {
            let view = load_resources(explorer, namespace, &filters).await?;
            if let Some(notice) = view.discovery_notice() {
                println!("{} {}", style("Warning:").yellow().bold(), style(notice).yellow());
            }
            print_table(&output::resources_table(&view, top), start);
            println!(
                "{}",
                style(format!(
                    "{} objects in {} resource types (refreshed {})",
                    view.total_objects,
                    view.discovered,
                    view.refreshed_at.format("%H:%M:%S")
                ))
                .dim()
            );
        }
        ReplCommand::Objects { resource } => {
            let spinner = create_spinner(&format!("Listing {}...", resource));
            let objects = explorer.get_resource_objects(namespace, &resource).await;
            spinner.finish_and_clear();
            print_table(&output::objects_table(&objects?), start);
        }
        ReplCommand::Get { resource, name } => {
            let detail = explorer.get_object(namespace, &resource, &name).await?;
            print!("{}", output::YamlFormatter::format_value(&detail)?);
        }
        ReplCommand::Raw { resource, name } => {
            let raw = explorer.get_raw_object(namespace, &resource, &name).await?;
            print!("{}", output::YamlFormatter::format_value(&raw)?);
        }
        ReplCommand::ClearCache => {
            explorer.clear_cache().await?;
            println!("{}", style("Cache cleared").dim());
        }
        ReplCommand::Status => {
            let status = explorer.cache_status().await?;
            print_table(&output::cache_status_table(&status), start);
        }
        ReplCommand::Help => print_help(),
        ReplCommand::ClearScreen => print!("\x1B[2J\x1B[1;1H"),
        // Handled by the loop
        ReplCommand::Quit => {}
    }

    Ok(())
}

fn print_error(e: &anyhow::Error) {
    match cli::cluster_unavailable(e) {
        Some(unavailable) => {
            println!("{} {}", style("Cluster unavailable:").yellow().bold(), unavailable);
            println!(
                "{}",
                style("Check the kubeconfig context (restart with --context <name>), then run 'clear-cache'").dim()
            );
        }
        None => println!("{} {}", style("Error:").red().bold(), style(format!("{:#}", e)).red()),
    }
}

pub async fn run_repl(explorer: Explorer) -> Result<()> {
    let helper = ExplorerHelper;
    let config = rustyline::Config::builder()
        .auto_add_history(true)
        .max_history_size(1000)?
        .build();

    let mut rl: Editor<ExplorerHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(helper));

    // Load history
    let history_path = config::base_dir()
        .map(|p| p.join("history"))
        .unwrap_or_else(|_| ".k8s-explorer_history".into());
    let _ = rl.load_history(&history_path);

    print_welcome(&explorer);

    let mut namespace = "default".to_string();

    loop {
        let prompt = format!("{}:{}> ", style("k8s-explorer").green().bold(), namespace);

        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();

                if input.is_empty() {
                    continue;
                }

                match ReplCommand::parse(input) {
                    Ok(ReplCommand::Quit) => {
                        println!("{}", style("Goodbye!").dim());
                        break;
                    }
                    Ok(command) => {
                        if let Err(e) = execute(&explorer, &mut namespace, command).await {
                            print_error(&e);
                        }
                    }
                    Err(e) => {
                        println!("{} {}", style("Parse error:").red().bold(), style(e).red());
                    }
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", style("^C").dim());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", style("Goodbye!").dim());
                break;
            }
            Err(err) => {
                println!("{} {:?}", style("Error:").red().bold(), err);
                break;
            }
        }
    }

    // Save history
    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}
