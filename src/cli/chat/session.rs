use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who authored a message. Nothing else ever appears in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Immutable once appended to the session.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.to_string(),
            role,
            timestamp: Utc::now(),
        }
    }
}

/// In-memory state of one chat session: an append-only message log plus the
/// flag gating concurrent sends. Starts with a synthetic assistant greeting
/// and lives only as long as the process.
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    awaiting: bool,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(student_name: &str) -> Self {
        let greeting = format!(
            "Olá, {}! Sou o UniChat, seu assistente acadêmico. Como posso ajudar você hoje?",
            student_name
        );

        Self {
            messages: vec![ChatMessage::new(Role::Assistant, &greeting)],
            awaiting: false,
            last_error: None,
        }
    }

    pub fn push_user(&mut self, content: &str) -> &ChatMessage {
        self.messages.push(ChatMessage::new(Role::User, content));
        self.messages.last().unwrap()
    }

    pub fn push_assistant(&mut self, content: &str) -> &ChatMessage {
        self.messages.push(ChatMessage::new(Role::Assistant, content));
        self.messages.last().unwrap()
    }

    /// Mark a request as in flight. Further sends are rejected until
    /// `end_turn` runs.
    pub fn begin_turn(&mut self) {
        self.awaiting = true;
        self.last_error = None;
    }

    pub fn end_turn(&mut self) {
        self.awaiting = false;
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
