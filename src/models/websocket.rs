use serde::{ Serialize, Deserialize };
use crate::models::chat::TranscriptEntry;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImageUpload {
    pub name: String,
    /// Raw file bytes, base64-encoded by the client.
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "upload")] Upload {
        images: Vec<ImageUpload>,
    },
    #[serde(rename = "compare")]
    Compare,
    #[serde(rename = "creativity")] Creativity {
        level: String,
    },
    #[serde(rename = "reset")]
    Reset,
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "response")] Response {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "refused")] Refused {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "notice")] Notice {
        content: String,
    },
    #[serde(rename = "analysis")] Analysis {
        markdown: String,
        filename: String,
    },
    #[serde(rename = "history")] History {
        messages: Vec<TranscriptEntry>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
}
