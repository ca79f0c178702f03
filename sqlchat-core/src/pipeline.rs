//! Chat pipeline: one question in, one answer out.
//!
//! Steps, in order: introspect schema, build SQL prompt, model call, extract SQL,
//! execute, build answer prompt, model call. Connection, model and extraction
//! failures abort the request. SQL errors are handed to the second model call so
//! the answer can explain them. If that second call fails, the raw result is
//! returned instead and the turn is not recorded.

use serde::Serialize;

use crate::error::ChatError;
use crate::extract::extract_sql;
use crate::llm::LlmBackend;
use crate::models::{QueryResult, Turn};
use crate::prompt::{build_answer_prompt, build_sql_prompt};
use crate::session::ChatSession;

/// Result of a pipeline run that reached execution.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
    pub answer: String,
    /// True when the answer is the raw result because the model could not phrase it.
    pub degraded: bool,
    pub model_error: Option<String>,
}

impl Reply {
    /// The turn to record, if the reply is complete.
    pub fn turn(&self) -> Option<Turn> {
        if self.degraded {
            None
        } else {
            Some(Turn::new(self.question.clone(), self.answer.clone()))
        }
    }
}

/// Run the pipeline for `question` against `session`. The session is not modified.
pub async fn ask(
    session: &ChatSession,
    question: &str,
    llm: &dyn LlmBackend,
) -> Result<Reply, ChatError> {
    let question = question.trim();
    let history = session.history.turns();

    let schema = session
        .database
        .describe_schema()
        .await
        .map_err(ChatError::Connection)?;

    let sql_prompt = build_sql_prompt(&schema, history, question);
    let raw = llm.complete(&sql_prompt).await?;
    let sql = extract_sql(&raw).map_err(|e| {
        tracing::warn!(session_id = %session.id, error = %e, output = %raw, "No SQL in model output");
        e
    })?;
    tracing::info!(session_id = %session.id, sql = %sql, "Generated SQL");

    let result = session
        .database
        .execute(&sql)
        .await
        .map_err(ChatError::Connection)?;
    let result_text = result.render();

    let answer_prompt = build_answer_prompt(&schema, history, question, &sql, &result_text);
    let reply = match llm.complete(&answer_prompt).await {
        Ok(answer) => Reply {
            question: question.to_string(),
            sql,
            result,
            answer,
            degraded: false,
            model_error: None,
        },
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "Answer composition failed, returning raw result");
            Reply {
                question: question.to_string(),
                sql,
                result,
                answer: fallback_answer(&result_text),
                degraded: true,
                model_error: Some(e.to_string()),
            }
        }
    };

    Ok(reply)
}

/// `(session, question) -> (session', reply)`: the returned session has the new
/// turn appended only when the reply is complete.
pub async fn answer_question(
    session: ChatSession,
    question: &str,
    llm: &dyn LlmBackend,
) -> (ChatSession, Result<Reply, ChatError>) {
    let outcome = ask(&session, question, llm).await;
    let session = match outcome.as_ref().ok().and_then(Reply::turn) {
        Some(turn) => session.with_turn(turn),
        None => session,
    };
    (session, outcome)
}

fn fallback_answer(result_text: &str) -> String {
    format!(
        "The language model is unavailable, so here is the raw query result:\n\n{}",
        result_text
    )
}
