//! Chat session store: ordered turn history plus the session's database connection.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::db::Database;
use crate::models::{ConnectionConfig, Turn};

/// Ordered, append-only (until cleared) list of completed turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a complete exchange. Both halves are stored together or not at all.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.push(Turn::new(question, answer));
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Everything one user's conversation needs: who it talks to and what was said.
#[derive(Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub connection: ConnectionConfig,
    pub database: Arc<dyn Database>,
    pub history: ChatHistory,
}

impl ChatSession {
    pub fn new(connection: ConnectionConfig, database: Arc<dyn Database>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection,
            database,
            history: ChatHistory::new(),
        }
    }

    /// Successor session with `turn` appended.
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.history.push(turn);
        self
    }

    /// Swap the connection, keeping id and history.
    pub fn reconnect(mut self, connection: ConnectionConfig, database: Arc<dyn Database>) -> Self {
        self.connection = connection;
        self.database = database;
        self
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("turns", &self.history.len())
            .finish()
    }
}
