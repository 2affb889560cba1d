use anyhow::{Context, Result};
use serde::Serialize;

use super::TableData;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(data: &TableData) -> String {
        let rows = data.to_json_rows();
        serde_yaml::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn format_value<T: Serialize>(value: &T) -> Result<String> {
        serde_yaml::to_string(value).context("Failed to encode YAML")
    }
}
