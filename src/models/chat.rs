use chrono::Utc;
use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One piece of a multimodal message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Base64-encoded image bytes.
    Image {
        data: String,
        mime: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text shown to a reader: the plain string, or all text parts joined by newlines.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) =>
                parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.as_str()),
                        ContentPart::Image { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) =>
                parts
                    .iter()
                    .filter(|part| matches!(part, ContentPart::Image { .. }))
                    .count(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// A single transcript entry. Fields are read-only once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    role: Role,
    content: MessageContent,
    timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// User message carrying the text first, followed by one part per image.
    pub fn user_with_images<'a, I>(text: &str, images: I) -> Self
        where I: IntoIterator<Item = (&'a str, &'a str)>
    {
        let mut parts = vec![ContentPart::Text { text: text.to_string() }];
        for (data, mime) in images {
            parts.push(ContentPart::Image {
                data: data.to_string(),
                mime: mime.to_string(),
            });
        }
        Self::new(Role::User, MessageContent::Parts(parts))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn text(&self) -> String {
        self.content.as_text()
    }
}

/// What the UI needs to render a transcript line; image payloads are reduced to a count.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub images: usize,
    pub timestamp: i64,
}

impl From<&ChatMessage> for TranscriptEntry {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role(),
            content: msg.text(),
            images: msg.content().image_count(),
            timestamp: msg.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_serializes_as_plain_string() {
        let msg = ChatMessage::user("오리");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "오리");
    }

    #[test]
    fn multimodal_content_keeps_part_order() {
        let msg = ChatMessage::user_with_images("compare these", [
            ("AAAA", "image/jpeg"),
            ("BBBB", "image/jpeg"),
        ]);
        match msg.content() {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], ContentPart::Text { text } if text == "compare these"));
                assert!(matches!(&parts[2], ContentPart::Image { data, .. } if data == "BBBB"));
            }
            other => panic!("expected parts, got {:?}", other),
        }
        assert_eq!(msg.text(), "compare these");
        assert_eq!(msg.content().image_count(), 2);
    }

    #[test]
    fn parts_deserialize_from_tagged_json() {
        let raw = r#"[{"type":"text","text":"hi"},{"type":"image","data":"Zm9v","mime":"image/png"}]"#;
        let content: MessageContent = serde_json::from_str(raw).unwrap();
        assert_eq!(content.image_count(), 1);
        assert_eq!(content.as_text(), "hi");
    }

    #[test]
    fn transcript_entry_hides_image_payload() {
        let msg = ChatMessage::user_with_images("look", [("AAAA", "image/jpeg")]);
        let entry = TranscriptEntry::from(&msg);
        assert_eq!(entry.content, "look");
        assert_eq!(entry.images, 1);
        assert_eq!(entry.role, Role::User);
    }
}
