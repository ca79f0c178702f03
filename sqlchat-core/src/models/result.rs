use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column names plus rows of JSON-typed cells, in result order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// True when rows beyond the configured limit were dropped.
    #[serde(default)]
    pub truncated: bool,
}

/// Outcome of running a generated statement. SQL errors are data, not failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    Rows(ResultSet),
    Error { message: String },
}

impl QueryResult {
    pub fn error(message: impl Into<String>) -> Self {
        QueryResult::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error { .. })
    }

    /// Plain-text rendering for prompts and the raw-result fallback.
    pub fn render(&self) -> String {
        match self {
            QueryResult::Error { message } => format!("ERROR: {}", message),
            QueryResult::Rows(set) => set.render(),
        }
    }
}

impl ResultSet {
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return if self.columns.is_empty() {
                "(statement executed, no rows returned)".to_string()
            } else {
                format!("{}\n(0 rows)", self.columns.join("\t"))
            };
        }

        let mut out = self.columns.join("\t");
        for row in &self.rows {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            out.push_str(&cells.join("\t"));
        }
        if self.truncated {
            out.push_str(&format!("\n(truncated to {} rows)", self.rows.len()));
        }
        out
    }
}

pub(crate) fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
