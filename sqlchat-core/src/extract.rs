//! SQL extraction from free-form model output.
//!
//! Priority order:
//! 1. the first non-empty fenced code block (```` ``` ```` with an optional language
//!    tag), trimmed;
//! 2. the first line that starts with a SQL keyword, continued over following lines
//!    that still read as SQL (indented, or opening with a clause keyword), up to and
//!    including the first unquoted `;`;
//! 3. otherwise [`ExtractionError::NoSql`].
//!
//! Keywords match in all-uppercase or all-lowercase only, so prose such as
//! "With that in mind, ..." is not mistaken for a `WITH` query.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractionError;

static FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)```").unwrap());

static KEYWORD_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?i:sql(?:\s+query)?\s*:\s*)?((?:SELECT|WITH|INSERT|UPDATE|DELETE|CREATE|DROP|ALTER|SHOW|EXPLAIN|DESCRIBE|VALUES|TRUNCATE|REPLACE|select|with|insert|update|delete|create|drop|alter|show|explain|describe|values|truncate|replace)\b.*)$",
    )
    .unwrap()
});

static CONTINUATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[),(]|(?:FROM|WHERE|JOIN|INNER|LEFT|RIGHT|FULL|CROSS|OUTER|ON|USING|GROUP|ORDER|BY|HAVING|LIMIT|OFFSET|FETCH|UNION|INTERSECT|EXCEPT|AND|OR|NOT|SELECT|SET|VALUES|RETURNING|INTO|AS|WINDOW|CASE|WHEN|THEN|ELSE|END|from|where|join|inner|left|right|full|cross|outer|on|using|group|order|by|having|limit|offset|fetch|union|intersect|except|and|or|not|select|set|values|returning|into|as|window|case|when|then|else|end)\b)",
    )
    .unwrap()
});

/// Isolate exactly one SQL statement from `text`.
pub fn extract_sql(text: &str) -> Result<String, ExtractionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::EmptyOutput);
    }

    if let Some(sql) = fenced_block(text) {
        return Ok(sql);
    }

    keyword_statement(text).ok_or(ExtractionError::NoSql)
}

fn fenced_block(text: &str) -> Option<String> {
    FENCE_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|body| !body.is_empty())
        .map(str::to_string)
}

fn keyword_statement(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let first = lines.by_ref().find_map(|line| {
        KEYWORD_LINE_REGEX
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })?;

    let mut statement = first;
    for line in lines {
        if statement_end(&statement).is_some() || !continues_statement(&statement, line) {
            break;
        }
        statement.push('\n');
        statement.push_str(line);
    }

    if let Some(end) = statement_end(&statement) {
        statement.truncate(end + 1);
    }
    Some(statement.trim().to_string())
}

/// Whether `line` reads as the next line of `statement` rather than commentary:
/// indented, opening with a clause keyword or punctuation, or following a line
/// that is visibly unfinished.
fn continues_statement(statement: &str, line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    if line.starts_with([' ', '\t']) || CONTINUATION_REGEX.is_match(line) {
        return true;
    }
    statement
        .trim_end()
        .ends_with([',', '(', '=', '+', '<', '>'])
}

/// Byte index of the first `;` outside single- or double-quoted text.
fn statement_end(sql: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in sql.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, ';') => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_is_returned_exactly() {
        let output = "Here you go:\n```sql\n  SELECT COUNT(*) FROM customers;  \n```\nThis counts rows.";
        assert_eq!(extract_sql(output).unwrap(), "SELECT COUNT(*) FROM customers;");
    }

    #[test]
    fn test_fence_without_language_tag() {
        let output = "```\nSELECT name\nFROM artist\nLIMIT 10\n```";
        assert_eq!(extract_sql(output).unwrap(), "SELECT name\nFROM artist\nLIMIT 10");
    }

    #[test]
    fn test_first_fenced_block_wins() {
        let output = "```sql\nSELECT 1\n```\nor\n```sql\nSELECT 2\n```";
        assert_eq!(extract_sql(output).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_plain_statement() {
        assert_eq!(
            extract_sql("SELECT COUNT(*) FROM customers;").unwrap(),
            "SELECT COUNT(*) FROM customers;"
        );
    }

    #[test]
    fn test_keyword_line_after_prose() {
        let output = "Sure! Here is the query:\nSELECT COUNT(*)\nFROM customers;\nIt counts every customer.";
        assert_eq!(extract_sql(output).unwrap(), "SELECT COUNT(*)\nFROM customers;");
    }

    #[test]
    fn test_keyword_statement_stops_at_blank_line() {
        let output = "select name from artist limit 3\n\nThis returns three artists.";
        assert_eq!(extract_sql(output).unwrap(), "select name from artist limit 3");
    }

    #[test]
    fn test_echoed_label_is_stripped() {
        let output = "SQL Query: SELECT name FROM artist LIMIT 10;";
        assert_eq!(extract_sql(output).unwrap(), "SELECT name FROM artist LIMIT 10;");
    }

    #[test]
    fn test_semicolon_inside_quotes_does_not_end_statement() {
        let output = "SELECT * FROM notes WHERE body = 'a;b'; SELECT 2;";
        assert_eq!(
            extract_sql(output).unwrap(),
            "SELECT * FROM notes WHERE body = 'a;b';"
        );
    }

    #[test]
    fn test_titlecase_prose_is_not_sql() {
        let output = "With the schema provided I cannot answer that.\nSelect a different question.";
        assert_eq!(extract_sql(output), Err(ExtractionError::NoSql));
    }

    #[test]
    fn test_no_sql_fails_deterministically() {
        let output = "I'm sorry, I don't know which table holds that information.";
        assert_eq!(extract_sql(output), Err(ExtractionError::NoSql));
        assert_eq!(extract_sql(output), Err(ExtractionError::NoSql));
    }

    #[test]
    fn test_inline_fence() {
        assert_eq!(extract_sql("Try ```SELECT 1``` instead").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(extract_sql("   \n "), Err(ExtractionError::EmptyOutput));
    }

    #[test]
    fn test_unterminated_statement_stops_before_prose() {
        let output = "SELECT COUNT(*) FROM customers\nThis query counts every customer.";
        assert_eq!(extract_sql(output).unwrap(), "SELECT COUNT(*) FROM customers");
    }

    #[test]
    fn test_unterminated_statement_keeps_clause_lines() {
        let output = "SELECT name,\ntotal\nFROM invoice\n  JOIN customer USING (customer_id)\nORDER BY total DESC\nLIMIT 5\nThese are the five largest invoices.";
        assert_eq!(
            extract_sql(output).unwrap(),
            "SELECT name,\ntotal\nFROM invoice\n  JOIN customer USING (customer_id)\nORDER BY total DESC\nLIMIT 5"
        );
    }

    #[test]
    fn test_empty_fence_then_real_fence() {
        let output = "```\n```\n```sql\nSELECT 1\n```";
        assert_eq!(extract_sql(output).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_empty_fence_falls_through_to_keyword_line() {
        let output = "```\n```\nSELECT 1;";
        assert_eq!(extract_sql(output).unwrap(), "SELECT 1;");
    }
}
