use serde::{Deserialize, Serialize};

use crate::types::ChatRole;

/// One message in the conversation.
///
/// Turns are immutable once created.  On disk a transcript is a JSON array of turns using
/// the `Role`/`Content` keys:
///
/// ```json
/// [{ "Role": "user", "Content": "hello" }]
/// ```
///
/// Lowercase `role`/`content` keys are accepted on read, and a missing content is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Turn {
    #[serde(alias = "role")]
    role: ChatRole,
    #[serde(alias = "content", default)]
    content: String,
}

impl Turn {
    /// Create a new `Turn` with the given role and content.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// The author of this turn.
    pub fn role(&self) -> ChatRole {
        self.role
    }

    /// The text of this turn.
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn turn_serializes_with_pascal_case_keys() {
        let turn = Turn::user("Hello there");
        assert_eq!(
            to_value(&turn).unwrap(),
            json!({
                "Role": "user",
                "Content": "Hello there"
            })
        );
    }

    #[test]
    fn turn_deserialization() {
        let turn: Turn = serde_json::from_value(json!({
            "Role": "assistant",
            "Content": "General Kenobi"
        }))
        .unwrap();
        assert_eq!(turn.role(), ChatRole::Assistant);
        assert_eq!(turn.content(), "General Kenobi");
    }

    #[test]
    fn lowercase_keys_are_accepted() {
        let turn: Turn = serde_json::from_value(json!({
            "role": "user",
            "content": "hi"
        }))
        .unwrap();
        assert_eq!(turn, Turn::user("hi"));
        assert_eq!(
            to_value(&turn).unwrap(),
            json!({
                "Role": "user",
                "Content": "hi"
            })
        );
    }

    #[test]
    fn missing_content_is_empty() {
        let turn: Turn = serde_json::from_value(json!({ "role": "assistant" })).unwrap();
        assert_eq!(turn, Turn::assistant(""));
    }
}
