use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;

/// A single row in the `chat_history` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Assigned by SQLite; strictly increasing and never reused.
    pub id: i64,
    /// `"user"` or `"model"`.
    pub sender: String,
    pub message: String,
}

/// The two parties of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Model,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Model => "model",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "model" => Ok(Sender::Model),
            other => Err(ChatError::InvalidArgument(format!(
                "unknown sender {other:?}; expected \"user\" or \"model\""
            ))),
        }
    }
}
