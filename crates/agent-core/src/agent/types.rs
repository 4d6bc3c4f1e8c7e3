use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Roles whose content may be cut down to fit a prompt budget.
    pub fn is_conversational(self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

/// One conversation turn. Order inside a conversation is the order the provider sees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-connection conversation state.
///
/// A session belongs to exactly one connection. History only grows through
/// [`Session::record_exchange`], which appends the user turn and the answer
/// together, and is emptied by [`Session::reset`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub system_prompt: Option<String>,
    pub history: Vec<Message>,
    #[serde(skip)]
    default_prompt: Option<String>,
}

impl Session {
    pub fn new(system_prompt: Option<String>) -> Self {
        let system_prompt = system_prompt.filter(|prompt| !prompt.trim().is_empty());
        Self {
            default_prompt: system_prompt.clone(),
            system_prompt,
            history: Vec::new(),
        }
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt.filter(|prompt| !prompt.trim().is_empty());
    }

    /// Drop the history and go back to the prompt the session started with.
    pub fn reset(&mut self) {
        self.history.clear();
        self.system_prompt = self.default_prompt.clone();
    }

    /// Append a finished exchange. Empty answers leave the history untouched.
    pub fn record_exchange(&mut self, user_turn: impl Into<String>, answer: impl Into<String>) -> bool {
        let answer = answer.into();
        if answer.is_empty() {
            return false;
        }
        self.history.push(Message::user(user_turn));
        self.history.push(Message::assistant(answer));
        true
    }

    /// System prompt (if any), then history, then the new user turn.
    pub fn build_messages(&self, user_turn: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(self.history.iter().cloned());
        if !user_turn.is_empty() {
            messages.push(Message::user(user_turn));
        }
        messages
    }

    /// Like [`Session::build_messages`], but the client supplied the
    /// conversation. A system message in `conversation` wins over the
    /// session prompt; the user turn is appended unless it already closes
    /// the conversation.
    pub fn build_messages_from(&self, conversation: &[Message], user_turn: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 2);
        let has_system = conversation.iter().any(|m| m.role == Role::System);
        if !has_system {
            if let Some(prompt) = &self.system_prompt {
                messages.push(Message::system(prompt.clone()));
            }
        }
        messages.extend(conversation.iter().cloned());

        let already_last = messages
            .last()
            .map(|m| m.role == Role::User && m.content == user_turn)
            .unwrap_or(false);
        if !user_turn.is_empty() && !already_last {
            messages.push(Message::user(user_turn));
        }
        messages
    }
}
