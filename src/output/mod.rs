mod csv;
mod json;
mod table;
mod yaml;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::kubernetes::{CacheStatus, NamespaceResources, ObjectSummary};

#[derive(Debug, Clone)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Csv => CsvFormatter::format(self, no_headers),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| (col.clone(), Value::String(val.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Typed value as a JSON or YAML document; YAML for table and CSV output
pub fn format_document<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => JsonFormatter::format_value(value),
        OutputFormat::Yaml | OutputFormat::Table | OutputFormat::Csv => YamlFormatter::format_value(value),
    }
}

/// Typed value for JSON/YAML, table builder output otherwise
pub fn render<T: Serialize>(
    value: &T,
    table: impl FnOnce() -> TableData,
    format: &OutputFormat,
    no_headers: bool,
) -> Result<String> {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => format_document(value, format),
        OutputFormat::Table | OutputFormat::Csv => Ok(table().format(format, no_headers)),
    }
}

pub fn namespaces_table(namespaces: &[String]) -> TableData {
    let mut data = TableData::new(&["NAMESPACE"]);
    for ns in namespaces {
        data.push(vec![ns.clone()]);
    }
    data
}

/// Counted resources; `top` switches to a count-descending view
pub fn resources_table(view: &NamespaceResources, top: Option<usize>) -> TableData {
    let items: Vec<_> = match top {
        Some(n) => view.top(n),
        None => view.resources.iter().collect(),
    };

    let mut data = TableData::new(&["RESOURCE", "KIND", "API GROUP", "VERSION", "SHORT", "COUNT"]);
    for item in items {
        let r = &item.resource;
        data.push(vec![
            r.display_name.clone(),
            r.kind.clone(),
            r.group_label().to_string(),
            r.api_version.clone(),
            r.short_name.clone().unwrap_or_default(),
            item.count.to_string(),
        ]);
    }
    data
}

/// Spreadsheet export of every listed resource type
pub fn export_table(view: &NamespaceResources) -> TableData {
    let mut data = TableData::new(&["Resource Name", "Kind", "API Group", "API Version", "Namespaced", "Count"]);
    for item in &view.resources {
        let r = &item.resource;
        data.push(vec![
            r.name.clone(),
            r.kind.clone(),
            r.group_label().to_string(),
            r.api_version.clone(),
            r.namespaced.to_string(),
            item.count.to_string(),
        ]);
    }
    data
}

pub fn objects_table(objects: &[ObjectSummary]) -> TableData {
    let mut data = TableData::new(&["NAME", "KIND", "API VERSION", "CREATED", "LABELS"]);
    for obj in objects {
        let labels = obj
            .labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        data.push(vec![
            obj.name.clone(),
            obj.kind.clone(),
            obj.api_version.clone(),
            obj.creation_timestamp
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            labels,
        ]);
    }
    data
}

pub fn cache_status_table(status: &CacheStatus) -> TableData {
    let mut data = TableData::new(&["CACHE", "RESOURCE TYPES", "OBJECTS", "AGE", "STATE"]);
    data.push(vec![
        "(catalog)".to_string(),
        String::new(),
        String::new(),
        status
            .catalog_age_secs
            .map(|a| format!("{}s", a))
            .unwrap_or_else(|| "-".to_string()),
        if status.catalog_age_secs.is_some() { "stored" } else { "empty" }.to_string(),
    ]);
    for ns in &status.namespaces {
        data.push(vec![
            ns.namespace.clone(),
            ns.resource_types.to_string(),
            ns.total_objects.to_string(),
            format!("{}s", ns.age_secs),
            if ns.fresh { "fresh" } else { "stale" }.to_string(),
        ]);
    }
    for ns in &status.scanning {
        data.push(vec![
            ns.clone(),
            String::new(),
            String::new(),
            "-".to_string(),
            "scanning".to_string(),
        ]);
    }
    data
}
