use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, post_json, ChatClient, ChatRequest, CompletionResponse, LlmError };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, ContentPart, MessageContent };

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const CHAT_ROUTE: &str = "/v1/chat/completions";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: OpenAIContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

fn to_openai_message(msg: &ChatMessage) -> OpenAIMessage {
    let content = match msg.content() {
        MessageContent::Text(text) => OpenAIContent::Text(text.clone()),
        MessageContent::Parts(parts) =>
            OpenAIContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => OpenAIPart::Text { text: text.clone() },
                        ContentPart::Image { data, mime } =>
                            OpenAIPart::ImageUrl {
                                image_url: ImageUrl {
                                    url: format!("data:{};base64,{}", mime, data),
                                },
                            },
                    })
                    .collect()
            ),
    };
    OpenAIMessage {
        role: msg.role().as_str(),
        content,
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                LlmError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        Ok(Self {
            http: build_http_client(timeout, headers)?,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| LlmError::Config("OpenAI API key is required (OPENAI_API_KEY)".to_string()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.timeout)
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}{}", base, CHAT_ROUTE)
        }
    }

    fn payload(&self, request: &ChatRequest) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(to_openai_message).collect(),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<CompletionResponse, LlmError> {
        let url = self.endpoint();
        info!(
            "OpenAI request: model={}, messages={}, temperature={}",
            self.model,
            request.messages.len(),
            request.temperature
        );
        let resp: OpenAIResponse = post_json(&self.http, &url, &self.payload(request)).await?;

        let content = resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn get_llm_backend(&self) -> LlmType {
        LlmType::OpenAI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base_url: Option<&str>) -> OpenAIChatClient {
        OpenAIChatClient::new(
            "sk-test".to_string(),
            None,
            base_url.map(str::to_string),
            Duration::from_secs(5)
        ).unwrap()
    }

    #[test]
    fn endpoint_accepts_several_base_url_shapes() {
        assert_eq!(client(None).endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(client(Some("http://proxy/v1/")).endpoint(), "http://proxy/v1/chat/completions");
        assert_eq!(
            client(Some("http://proxy/v1/chat/completions")).endpoint(),
            "http://proxy/v1/chat/completions"
        );
    }

    #[test]
    fn payload_matches_chat_completions_shape() {
        let request = ChatRequest::new(
            vec![
                ChatMessage::system("You are a helpful assistant."),
                ChatMessage::user_with_images("무엇이 다른가요?", [("QUJD", "image/jpeg")])
            ],
            0.7,
            1500
        );
        let json = serde_json::to_value(client(None).payload(&request)).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 1500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are a helpful assistant.");
        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn response_without_content_is_empty() {
        let resp: OpenAIResponse = serde_json
            ::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
            .unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }
}
