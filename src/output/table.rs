use comfy_table::{Cell, CellAlignment, Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::TableData;

/// Free-form columns are cut to this many characters
const WIDE_COLUMN_LIMIT: usize = 60;

const WIDE_COLUMNS: &[&str] = &["LABELS", "ANNOTATIONS"];

/// Counts line up on the right
const NUMERIC_COLUMNS: &[&str] = &["COUNT", "OBJECTS", "RESOURCE TYPES"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Plain,
    Wide,
    Numeric,
}

impl ColumnKind {
    fn of(column: &str) -> Self {
        if WIDE_COLUMNS.contains(&column) {
            ColumnKind::Wide
        } else if NUMERIC_COLUMNS.contains(&column) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Plain
        }
    }

    fn cell(self, value: &str) -> Cell {
        match self {
            ColumnKind::Plain => Cell::new(value),
            ColumnKind::Wide => Cell::new(shorten(value, WIDE_COLUMN_LIMIT)),
            ColumnKind::Numeric => Cell::new(value).set_alignment(CellAlignment::Right),
        }
    }
}

/// Cut to at most `limit` characters, ending in "..." when cut
fn shorten(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let kept: String = value.chars().take(limit.saturating_sub(3)).collect();
    kept + "..."
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(data: &TableData, no_headers: bool) -> String {
        if data.rows.is_empty() {
            return "(no items)".to_string();
        }

        let kinds: Vec<ColumnKind> = data.columns.iter().map(|c| ColumnKind::of(c)).collect();

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        if !no_headers {
            table.set_header(&data.columns);
        }
        for row in &data.rows {
            table.add_row(
                row.iter()
                    .zip(&kinds)
                    .map(|(value, kind)| kind.cell(value)),
            );
        }

        let total = data.rows.len();
        format!(
            "{}\n({} {})",
            table,
            total,
            if total == 1 { "item" } else { "items" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("hello", 10), "hello");
        assert_eq!(shorten("1234567890", 10), "1234567890");

        let cut = shorten("app=web,tier=frontend,release=stable", 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("..."));

        // Characters, not bytes
        let cut = shorten("日本語テストです長い文字列", 8);
        assert_eq!(cut, "日本語テス...");
    }

    #[test]
    fn test_labels_are_shortened() {
        let mut data = TableData::new(&["NAME", "LABELS"]);
        data.push(vec!["nginx".to_string(), "a".repeat(80)]);

        let output = TableFormatter::format(&data, false);
        assert!(!output.contains(&"a".repeat(80)));
        assert!(output.contains(&format!("{}...", "a".repeat(57))));
        assert!(output.ends_with("(1 item)"));
    }

    #[test]
    fn test_other_columns_kept_whole() {
        let mut data = TableData::new(&["NAME", "KIND"]);
        data.push(vec!["nginx".to_string(), "a".repeat(80)]);
        data.push(vec!["redis".to_string(), "b".to_string()]);

        let output = TableFormatter::format(&data, false);
        assert!(output.contains(&"a".repeat(80)));
        assert!(output.ends_with("(2 items)"));
    }

    #[test]
    fn test_counts_right_aligned() {
        let mut data = TableData::new(&["RESOURCE", "COUNT"]);
        data.push(vec!["pods".to_string(), "1200".to_string()]);
        data.push(vec!["secrets".to_string(), "7".to_string()]);

        let output = TableFormatter::format(&data, true);
        let secrets = output.lines().find(|l| l.contains("secrets")).unwrap_or_default();
        assert!(secrets.contains("   7"));
    }

    #[test]
    fn test_empty_table() {
        let data = TableData::new(&["NAME"]);
        assert_eq!(TableFormatter::format(&data, false), "(no items)");
    }

    #[test]
    fn test_no_headers() {
        let mut data = TableData::new(&["NAMESPACE"]);
        data.push(vec!["default".to_string()]);
        let output = TableFormatter::format(&data, true);
        assert!(!output.contains("NAMESPACE"));
        assert!(output.contains("default"));
    }
}
