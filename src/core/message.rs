use crate::api::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One conversation turn. Assistant messages are appended to while their
/// stream is live and flagged `complete` once it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub complete: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            complete: true,
        }
    }

    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            complete: false,
        }
    }

    pub fn to_api(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.as_str().to_string(),
            content: self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_messages_use_wire_role_names() {
        let api = Message::user("hi").to_api();
        assert_eq!(api.role, "user");
        assert_eq!(api.content, "hi");
        assert_eq!(Message::assistant_placeholder().to_api().role, "assistant");
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn placeholder_starts_incomplete() {
        let message = Message::assistant_placeholder();
        assert!(!message.complete);
        assert!(message.content.is_empty());
        assert!(Message::user("hi").complete);
    }
}
