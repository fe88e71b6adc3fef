use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions prepended to every request.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl ChatRole {
    /// The lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(to_value(ChatRole::System).unwrap(), json!("system"));
        assert_eq!(to_value(ChatRole::User).unwrap(), json!("user"));
        assert_eq!(to_value(ChatRole::Assistant).unwrap(), json!("assistant"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_value::<ChatRole>(json!("tool")).is_err());
    }
}
