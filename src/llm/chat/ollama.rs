use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use reqwest::header::HeaderMap;
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, post_json, ChatClient, ChatRequest, CompletionResponse, LlmError };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, ContentPart, MessageContent };

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

fn to_ollama_message(msg: &ChatMessage) -> OllamaMessage {
    let images = match msg.content() {
        MessageContent::Text(_) => Vec::new(),
        MessageContent::Parts(parts) =>
            parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Image { data, .. } => Some(data.clone()),
                    ContentPart::Text { .. } => None,
                })
                .collect(),
    };
    OllamaMessage {
        role: msg.role().as_str(),
        content: msg.text(),
        images,
    }
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, LlmError> {
        let model = completion_model.unwrap_or_else(|| "llama3.2-vision".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Ok(Self {
            http: build_http_client(timeout, HeaderMap::new())?,
            base_url: url,
            completion_model: model,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".to_string()));
        }

        Self::new(config.base_url.clone(), config.completion_model.clone(), config.timeout)
    }

    fn payload(&self, request: &ChatRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.completion_model.clone(),
            messages: request.messages.iter().map(to_ollama_message).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, request: &ChatRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        info!(
            "Ollama request: model={}, messages={}",
            self.completion_model,
            request.messages.len()
        );
        let data: OllamaChatResponse = post_json(&self.http, &url, &self.payload(request)).await?;
        if data.message.content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(CompletionResponse { response: data.message.content })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn get_llm_backend(&self) -> LlmType {
        LlmType::Ollama
    }
}
