pub mod policy;

pub use policy::{ reject, KeywordPolicy };

use crate::ingest::image::EncodedImage;
use crate::models::chat::{ ChatMessage, MessageContent };
use log::debug;

pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const MAX_ATTACHMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Active,
}

/// Conversation state owned by a single UI session.
///
/// The transcript grows without bound; only the most recent `history_window`
/// entries are ever submitted. System instructions are never stored here, they
/// are prepended fresh by [`Session::build_request`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    transcript: Vec<ChatMessage>,
    attachments: Vec<EncodedImage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-seeded with user/assistant example exchanges (few-shot prompting).
    pub fn with_examples<'a, I>(examples: I) -> Self
        where I: IntoIterator<Item = (&'a str, &'a str)>
    {
        let mut session = Self::new();
        for (user, assistant) in examples {
            session.append(ChatMessage::user(user));
            session.append(ChatMessage::assistant(assistant));
        }
        session
    }

    pub fn append(&mut self, message: ChatMessage) {
        debug!("Appending {} message #{}", message.role(), self.transcript.len() + 1);
        self.transcript.push(message);
    }

    pub fn state(&self) -> SessionState {
        if self.transcript.is_empty() { SessionState::Empty } else { SessionState::Active }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// `[system] + last history_window messages + [new user message]`.
    ///
    /// The new message is always supplied by the caller and never read back from
    /// the transcript, so callers append it themselves after building the request.
    pub fn build_request(
        &self,
        new_user_text: &str,
        system_instruction: Option<&str>,
        history_window: usize
    ) -> Vec<ChatMessage> {
        self.build_request_with(
            MessageContent::Text(new_user_text.to_string()),
            system_instruction,
            history_window
        )
    }

    pub fn build_request_with(
        &self,
        new_user_content: MessageContent,
        system_instruction: Option<&str>,
        history_window: usize
    ) -> Vec<ChatMessage> {
        let window = self.window(history_window);
        let mut request = Vec::with_capacity(window.len() + 2);
        if let Some(system) = system_instruction {
            request.push(ChatMessage::system(system));
        }
        request.extend(window.iter().cloned());
        request.push(ChatMessage::user(new_user_content));
        request
    }

    fn window(&self, history_window: usize) -> &[ChatMessage] {
        let start = self.transcript.len().saturating_sub(history_window);
        &self.transcript[start..]
    }

    /// Replaces the current attachments, keeping at most [`MAX_ATTACHMENTS`].
    pub fn attach_images(&mut self, images: Vec<EncodedImage>) {
        self.attachments = images.into_iter().take(MAX_ATTACHMENTS).collect();
    }

    pub fn attachments(&self) -> &[EncodedImage] {
        &self.attachments
    }

    /// Content for the next user turn: plain text, or text plus every attached image.
    pub fn user_content(&self, text: &str) -> MessageContent {
        if self.attachments.is_empty() {
            return MessageContent::Text(text.to_string());
        }
        let message = ChatMessage::user_with_images(
            text,
            self.attachments.iter().map(|img| (img.data.as_str(), img.mime.as_str()))
        );
        message.content().clone()
    }
}
