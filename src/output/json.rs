use anyhow::{Context, Result};
use serde::Serialize;

use super::TableData;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(data: &TableData) -> String {
        let rows = data.to_json_rows();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn format_value<T: Serialize>(value: &T) -> Result<String> {
        serde_json::to_string_pretty(value).context("Failed to encode JSON")
    }
}
