use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text appended to a thread when a model stream fails.
pub const APOLOGY_TEXT: &str =
    "I'm sorry, I encountered an error. Please check your connection or API key and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

/// One turn in a thread.
///
/// Messages are replaced wholesale rather than edited; a streaming model
/// reply is re-created under the same `id` for every fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(new_id(), Role::User, content)
    }

    pub fn model(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Model, content)
    }

    pub fn apology() -> Self {
        Self::new(new_id(), Role::Model, APOLOGY_TEXT)
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }
}
