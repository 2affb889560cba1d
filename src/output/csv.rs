use super::TableData;

pub struct CsvFormatter;

fn escape(val: &str) -> String {
    if val.contains(',') || val.contains('"') || val.contains('\n') {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

impl CsvFormatter {
    pub fn format(data: &TableData, no_headers: bool) -> String {
        let mut lines = Vec::new();

        if !no_headers {
            let header: Vec<String> = data.columns.iter().map(|c| escape(c)).collect();
            lines.push(header.join(","));
        }

        for row in &data.rows {
            let escaped: Vec<String> = row.iter().map(|val| escape(val)).collect();
            lines.push(escaped.join(","));
        }

        lines.join("\n")
    }
}
