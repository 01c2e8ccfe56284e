//! Client-side data export.

use karakuri_core::{AutomationError, FileDownload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    /// Returns `export.json` or `export.csv`.
    pub fn file_name(&self) -> String {
        format!("export.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AutomationError::Export(format!(
                "unsupported export format: {other}"
            ))),
        }
    }
}

/// Serializes `data` in the requested format.
pub fn render(format: ExportFormat, data: &Value) -> Result<String, AutomationError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(data).map_err(|e| AutomationError::Export(e.to_string()))
        }
        ExportFormat::Csv => Ok(to_csv(data)),
    }
}

/// Builds the downloadable file for `data`.
pub fn export_file(format: ExportFormat, data: &Value) -> Result<FileDownload, AutomationError> {
    Ok(FileDownload {
        file_name: format.file_name(),
        mime_type: format.mime_type().to_string(),
        contents: render(format, data)?,
    })
}

/// Flattens an array of records into CSV.
///
/// Headers are the keys of the first record, in their original order. Each
/// cell is the JSON encoding of the value, so strings come out quoted and
/// escaped; missing and null values become `""`. Anything other than a
/// non-empty array yields an empty string.
pub fn to_csv(data: &Value) -> String {
    let rows = match data.as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => return String::new(),
    };
    let headers: Vec<&str> = rows[0]
        .as_object()
        .map(|first| first.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|header| match row.get(*header) {
                Some(Value::Null) | None => Value::String(String::new()).to_string(),
                Some(value) => value.to_string(),
            })
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_from_records() {
        let data = json!([
            {"name": "Alice", "plan": "pro", "seats": 3},
            {"name": "Bob, Jr.", "seats": 1, "active": true},
            {"name": null, "plan": "free", "seats": 0}
        ]);
        assert_eq!(
            to_csv(&data),
            "name,plan,seats\n\"Alice\",\"pro\",3\n\"Bob, Jr.\",\"\",1\n\"\",\"free\",0"
        );
    }

    #[test]
    fn test_csv_escapes_quotes() {
        let data = json!([{"note": "say \"hi\""}]);
        assert_eq!(to_csv(&data), "note\n\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_csv_degenerate_inputs() {
        assert_eq!(to_csv(&json!([])), "");
        assert_eq!(to_csv(&Value::Null), "");
        assert_eq!(to_csv(&json!({"not": "an array"})), "");
    }

    #[test]
    fn test_json_round_trip() {
        let data = json!({"rows": [{"id": 1, "tags": ["a", "b"]}], "total": 1.5, "ok": null});
        let rendered = render(ExportFormat::Json, &data).unwrap();
        assert!(rendered.contains("\n  \"rows\""));
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::Json.file_name(), "export.json");
        assert_eq!(ExportFormat::Csv.mime_type(), "text/csv");
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }
}
