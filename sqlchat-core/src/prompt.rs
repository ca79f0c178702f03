//! Prompt templates for the two model calls of a chat request.
//!
//! Both builders are pure: the same schema, history and question always produce
//! the same text, with history rendered oldest first.

use crate::models::Turn;

/// Render prior turns as `User:` / `Assistant:` lines in chronological order.
pub fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .flat_map(|turn| turn.messages())
        .map(|(role, text)| format!("{}: {}", role.label(), text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking the model for a single SQL statement answering `question`.
pub fn build_sql_prompt(schema: &str, history: &[Turn], question: &str) -> String {
    format!(
        r#"You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's PostgreSQL database.
Based on the table schema below, write a SQL query that would answer the user's question. Take the conversation history into account.

<SCHEMA>{schema}</SCHEMA>

Conversation History:
{history}

Write only the SQL query and nothing else. Do not wrap the SQL query in any other text, not even backticks.

For example:
Question: which 3 artists have the most tracks?
SQL Query: SELECT artist_id, COUNT(*) AS track_count FROM track GROUP BY artist_id ORDER BY track_count DESC LIMIT 3;
Question: Name 10 artists
SQL Query: SELECT name FROM artist LIMIT 10;

Your turn:

Question: {question}
SQL Query:"#,
        schema = schema,
        history = render_history(history),
        question = question.trim(),
    )
}

/// Prompt asking the model to phrase the execution result as a plain-language answer.
pub fn build_answer_prompt(
    schema: &str,
    history: &[Turn],
    question: &str,
    sql: &str,
    result: &str,
) -> String {
    format!(
        r#"You are a data analyst at a company. You are interacting with a user who is asking you questions about the company's database.
Based on the table schema below, question, sql query, and sql response, write a natural language response.
If the SQL response is an error, explain in plain language what went wrong and how the user could rephrase the question.
Answer in prose. Do not reply with a SQL query.

<SCHEMA>{schema}</SCHEMA>

Conversation History:
{history}

SQL Query: <SQL>{sql}</SQL>
User question: {question}
SQL Response: {result}"#,
        schema = schema,
        history = render_history(history),
        sql = sql,
        question = question.trim(),
        result = result,
    )
}
