pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use log::{ debug, error };
use reqwest::Client as HttpClient;
use serde::{ de::DeserializeOwned, Deserialize, Serialize };
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;

/// Failure talking to the completion endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("LLM API returned {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },
    #[error("LLM returned an empty response")]
    EmptyResponse,
    #[error("LLM configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            messages,
            temperature: temperature.clamp(0.0, 2.0),
            max_output_tokens,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
    fn get_llm_backend(&self) -> LlmType;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn build_http_client(
    timeout: Duration,
    headers: reqwest::header::HeaderMap
) -> Result<HttpClient, LlmError> {
    Ok(HttpClient::builder().default_headers(headers).timeout(timeout).build()?)
}

/// POSTs `payload` and decodes a JSON reply, turning non-2xx answers into [`LlmError::Api`].
pub(crate) async fn post_json<P, R>(http: &HttpClient, url: &str, payload: &P) -> Result<R, LlmError>
    where P: Serialize + ?Sized, R: DeserializeOwned
{
    debug!("POST {}", url);
    let resp = http.post(url).json(payload).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("LLM API error {} from {}: {}", status, url, body);
        return Err(LlmError::Api { status: status.as_u16(), body });
    }
    Ok(resp.json::<R>().await?)
}
