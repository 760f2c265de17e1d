use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::ingest::image::{ encode_base64_upload, encode_image, EncodedImage };
use crate::ingest::{ pdf, IngestError };
use crate::llm::LlmConfig;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, ChatRequest, LlmError };
use crate::models::chat::{ ChatMessage, MessageContent };
use crate::models::options::{ SummaryLanguage, SummaryLength };
use crate::models::websocket::ImageUpload;
use crate::report::docx::{ summary_document, SummaryDocument };
use crate::report::markdown::{ analysis_report, AnalysisReport };
use crate::report::table::{ format_as_markdown_table, table_template };
use crate::report::ReportError;
use crate::session::{ KeywordPolicy, Session, MAX_ATTACHMENTS };

use chrono::Local;
use log::{ info, warn, error };
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Documents shorter than this many characters are echoed instead of summarized.
pub const MIN_SUMMARY_CHARS: usize = 1000;
const SUMMARY_TEMPERATURE: f32 = 0.7;
const FEW_SHOT_TEMPERATURE: f32 = 0.9;
const TABLE_TEMPERATURE: f32 = 0.0;
const TABLE_MAX_TOKENS: u32 = 200;
const VISION_MAX_TOKENS: u32 = 1500;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("{0}")]
    Prompt(#[from] PromptError),
    #[error("차이점 분석을 위해서는 최소 2개의 이미지가 필요합니다. (현재 {0}개)")]
    NotEnoughImages(usize),
    #[error("파일 읽기 오류: {0}")]
    Io(#[from] std::io::Error),
    #[error("메시지를 입력해주세요.")]
    EmptyMessage,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub history_window: usize,
}

impl ChatSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            temperature: args.temperature,
            max_output_tokens: args.max_output_tokens,
            history_window: args.history_window,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1000,
            history_window: crate::session::DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Outcome of one accepted chat turn. Every variant has already been appended to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answer(String),
    Refused(String),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct UploadOutcome {
    pub stored: usize,
    pub warnings: Vec<String>,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    TooShort {
        notice: String,
        original: String,
    },
    Summary {
        original: String,
        summary: String,
        document: SummaryDocument,
    },
}

#[derive(Debug, Clone)]
pub struct ShotComparison {
    pub zero_shot: String,
    pub one_shot: String,
    pub few_shot: String,
}

#[derive(Clone)]
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    policy: KeywordPolicy,
    settings: ChatSettings,
}

impl ChatAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig::from_args(args)?;
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let prompt_config = prompt::load_prompts(&args.prompts_path)?;
        let policy = KeywordPolicy::from_csv(&args.forbidden_keywords);
        info!("Keyword policy loaded with {} term(s)", policy.terms().len());

        Ok(Self::with_client(chat_client, prompt_config, policy, ChatSettings::from_args(args)))
    }

    pub fn with_client(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        policy: KeywordPolicy,
        settings: ChatSettings
    ) -> Self {
        Self {
            chat_client,
            prompt_config,
            policy,
            settings,
        }
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    pub fn backend(&self) -> crate::llm::LlmType {
        self.chat_client.get_llm_backend()
    }

    /// Greeting shown before the first exchange of a session.
    pub fn greeting(&self, vision: bool) -> Result<&str, PromptError> {
        prompt::get_message(&self.prompt_config, if vision { "vision_greeting" } else { "greeting" })
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, AgentError> {
        let resp = self.chat_client.complete(&request).await?;
        Ok(resp.response)
    }

    fn chat_request(
        &self,
        session: &Session,
        content: MessageContent,
        temperature: Option<f32>
    ) -> Result<ChatRequest, AgentError> {
        let vision = !session.attachments().is_empty();
        let key = if vision { "vision" } else { "chat" };
        let system = prompt::get_system_instruction(&self.prompt_config, key)?;
        let messages = session.build_request_with(content, Some(system), self.settings.history_window);
        let max_tokens = if vision {
            self.settings.max_output_tokens.max(VISION_MAX_TOKENS)
        } else {
            self.settings.max_output_tokens
        };
        Ok(
            ChatRequest::new(
                messages,
                temperature.unwrap_or(self.settings.temperature),
                max_tokens
            )
        )
    }

    /// Runs one user turn against the session.
    ///
    /// Only `text` is checked against the keyword policy, never earlier turns.
    /// A blocked message gets the canned refusal without contacting the model.
    /// Failures are turned into a readable assistant message so the session stays usable.
    /// Blank text is rejected before anything is appended.
    pub async fn chat_turn(
        &self,
        session: &mut Session,
        text: &str,
        temperature: Option<f32>
    ) -> Result<Reply, AgentError> {
        if text.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        if self.policy.is_blocked(text) {
            let refusal = prompt
                ::get_message(&self.prompt_config, "refusal")
                .map(str::to_string)
                .unwrap_or_else(|e| {
                    warn!("{}", e);
                    "죄송합니다. 해당 요청에는 답변할 수 없습니다.".to_string()
                });
            session.append(ChatMessage::user(text));
            session.append(ChatMessage::assistant(refusal.as_str()));
            return Ok(Reply::Refused(refusal));
        }

        let content = session.user_content(text);
        let request = self.chat_request(session, content.clone(), temperature);
        session.append(ChatMessage::user(content));

        let result = match request {
            Ok(request) => self.complete(request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(answer) => {
                session.append(ChatMessage::assistant(answer.as_str()));
                Ok(Reply::Answer(answer))
            }
            Err(e) => {
                error!("Chat turn failed: {}", e);
                let message = prompt
                    ::get_chat_error(&self.prompt_config, &e.to_string())
                    .unwrap_or_else(|_| format!("오류가 발생했습니다: {}", e));
                session.append(ChatMessage::assistant(message.as_str()));
                Ok(Reply::Failed(message))
            }
        }
    }

    /// Stores up to three uploaded images in the session. Unreadable files are
    /// reported as warnings and skipped.
    pub fn attach_images(&self, session: &mut Session, uploads: &[ImageUpload]) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();
        if uploads.len() > MAX_ATTACHMENTS {
            warn!("Received {} images, keeping the first {}", uploads.len(), MAX_ATTACHMENTS);
        }

        let mut images = Vec::new();
        for upload in uploads.iter().take(MAX_ATTACHMENTS) {
            match encode_base64_upload(&upload.data) {
                Ok(image) => images.push(image),
                Err(e) => {
                    warn!("Skipping upload '{}': {}", upload.name, e);
                    outcome.warnings.push(format!("{}: {}", upload.name, e));
                }
            }
        }

        outcome.stored = images.len();
        session.attach_images(images);

        if outcome.stored > 0 {
            match prompt::get_image_notice(&self.prompt_config, outcome.stored) {
                Ok(notice) => {
                    session.append(ChatMessage::assistant(notice.as_str()));
                    outcome.notice = Some(notice);
                }
                Err(e) => warn!("{}", e),
            }
        }
        outcome
    }

    /// Reads and shrinks image files from disk, in order.
    pub fn load_images<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<EncodedImage>, AgentError> {
        paths
            .iter()
            .map(|path| -> Result<EncodedImage, AgentError> {
                let bytes = fs::read(path)?;
                Ok(encode_image(&bytes)?)
            })
            .collect()
    }

    /// Asks the model to fill in a difference table for two or three images.
    pub async fn compare_images(&self, images: &[EncodedImage]) -> Result<AnalysisReport, AgentError> {
        if images.len() < 2 {
            return Err(AgentError::NotEnoughImages(images.len()));
        }
        let images = &images[..images.len().min(MAX_ATTACHMENTS)];
        let count = images.len();

        let instruction = prompt::get_table_prompt(&self.prompt_config, table_template(count))?;
        let system = prompt::get_system_instruction(&self.prompt_config, "table_completion")?;
        let user = ChatMessage::user_with_images(
            &instruction,
            images.iter().map(|img| (img.data.as_str(), img.mime.as_str()))
        );
        let request = ChatRequest::new(
            vec![ChatMessage::system(system), user],
            TABLE_TEMPERATURE,
            TABLE_MAX_TOKENS
        );

        info!("Requesting difference table for {} images", count);
        let raw = self.complete(request).await?;
        let table = format_as_markdown_table(&raw, count);
        Ok(analysis_report(&table, count, Local::now()))
    }

    pub async fn summarize_document(
        &self,
        pdf_bytes: &[u8],
        filename: &str,
        length: SummaryLength,
        language: SummaryLanguage,
        max_tokens: Option<u32>
    ) -> Result<SummaryOutcome, AgentError> {
        let text = pdf::extract_text(pdf_bytes)?;
        self.summarize_text(text, filename, length, language, max_tokens).await
    }

    pub async fn summarize_text(
        &self,
        text: String,
        filename: &str,
        length: SummaryLength,
        language: SummaryLanguage,
        max_tokens: Option<u32>
    ) -> Result<SummaryOutcome, AgentError> {
        let chars = text.chars().count();
        if chars < MIN_SUMMARY_CHARS {
            info!("Document has {} characters, skipping summary", chars);
            let notice = prompt::get_message(&self.prompt_config, "short_document")?.to_string();
            return Ok(SummaryOutcome::TooShort { notice, original: text });
        }

        let system = prompt::get_summary_system_prompt(&self.prompt_config, length, language)?;
        let user = prompt::get_summary_request(&self.prompt_config, &text)?;
        let request = ChatRequest::new(
            vec![ChatMessage::system(system), ChatMessage::user(user)],
            SUMMARY_TEMPERATURE,
            max_tokens.unwrap_or(self.settings.max_output_tokens)
        );

        info!("Summarizing {} characters ({:?}, {:?})", chars, length, language);
        let summary = self.complete(request).await?;
        let document = summary_document(&text, &summary, filename, Local::now())?;
        Ok(SummaryOutcome::Summary { original: text, summary, document })
    }

    /// Single system + user completion with the plain assistant instruction.
    pub async fn ask(&self, question: &str) -> Result<String, AgentError> {
        let system = prompt::get_system_instruction(&self.prompt_config, "assistant")?;
        let request = ChatRequest::new(
            Session::new().build_request(question, Some(system), 0),
            self.settings.temperature,
            self.settings.max_output_tokens
        );
        self.complete(request).await
    }

    /// Answers `question` with no, one and all configured example exchanges.
    pub async fn compare_shots(&self, question: &str) -> Result<ShotComparison, AgentError> {
        let system = prompt::get_system_instruction(&self.prompt_config, "few_shot")?;
        let examples: Vec<(&str, &str)> = self.prompt_config.examples().collect();

        let mut answers = Vec::with_capacity(3);
        for shots in [0, examples.len().min(1), examples.len()] {
            let session = Session::with_examples(examples[..shots].iter().copied());
            let request = ChatRequest::new(
                session.build_request(question, Some(system), session.len()),
                FEW_SHOT_TEMPERATURE,
                self.settings.max_output_tokens
            );
            answers.push(self.complete(request).await?);
        }

        let few_shot = answers.pop().unwrap_or_default();
        let one_shot = answers.pop().unwrap_or_default();
        let zero_shot = answers.pop().unwrap_or_default();
        Ok(ShotComparison { zero_shot, one_shot, few_shot })
    }

    pub async fn reload_prompts_if_changed(
        &mut self,
        args: &Args
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let result = prompt::reload_prompts_if_changed(&args.prompts_path, &self.prompt_config)?;

        if let Some(new_config) = result {
            self.prompt_config = new_config;
            info!("Prompts successfully reloaded");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::shipped;
    use crate::llm::chat::fake::FakeChatClient;
    use crate::models::chat::{ ContentPart, MessageContent, Role };
    use base64::{ engine::general_purpose::STANDARD, Engine as _ };
    use image::{ ImageFormat, Rgb, RgbImage };
    use std::io::Cursor;

    fn agent_with(client: Arc<FakeChatClient>, settings: ChatSettings) -> ChatAgent {
        ChatAgent::with_client(
            client,
            Arc::new(shipped()),
            KeywordPolicy::from_csv("투자,주식"),
            settings
        )
    }

    fn agent(client: Arc<FakeChatClient>) -> ChatAgent {
        agent_with(client, ChatSettings::default())
    }

    fn png_upload(name: &str) -> ImageUpload {
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        ImageUpload { name: name.to_string(), data: STANDARD.encode(out.into_inner()) }
    }

    fn encoded(tag: &str) -> EncodedImage {
        EncodedImage {
            data: tag.to_string(),
            mime: "image/jpeg".to_string(),
            width: 8,
            height: 8,
        }
    }

    #[tokio::test]
    async fn blocked_message_is_refused_without_calling_model() {
        let client = Arc::new(FakeChatClient::default());
        let agent = agent(client.clone());
        let mut session = Session::new();

        let reply = agent.chat_turn(&mut session, "주식 추천해줘", None).await.unwrap();

        assert_eq!(reply, Reply::Refused("죄송합니다. 저는 금융 및 투자 상담을 할 수 없습니다.".to_string()));
        assert_eq!(client.request_count(), 0);
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages()[1].role(), Role::Assistant);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_untouched() {
        let client = Arc::new(FakeChatClient::replying(["never"]));
        let agent = agent(client.clone());
        let mut session = Session::new();

        let err = agent.chat_turn(&mut session, "  \n ", None).await.unwrap_err();

        assert!(matches!(err, AgentError::EmptyMessage));
        assert!(session.is_empty());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn policy_checks_only_latest_turn() {
        let client = Arc::new(FakeChatClient::replying(["refused earlier", "ok"]));
        let agent = agent(client.clone());
        let mut session = Session::new();
        session.append(ChatMessage::user("투자 얘기"));
        session.append(ChatMessage::assistant("..."));

        let reply = agent.chat_turn(&mut session, "피싱 메일은 어떻게 구별하나요?", None).await.unwrap();
        assert!(matches!(reply, Reply::Answer(_)));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn answer_is_appended_and_new_message_sent_once() {
        let client = Arc::new(FakeChatClient::replying(["첫 답변", "두 번째 답변"]));
        let agent = agent(client.clone());
        let mut session = Session::new();

        let first = agent.chat_turn(&mut session, "비밀번호 관리법?", None).await.unwrap();
        assert_eq!(first, Reply::Answer("첫 답변".to_string()));
        let request = client.last_request();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role(), Role::System);
        assert_eq!(request.temperature, 0.7);

        agent.chat_turn(&mut session, "2단계 인증은?", Some(0.2)).await.unwrap();
        let request = client.last_request();
        let texts: Vec<String> = request.messages.iter().map(|m| m.text()).collect();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(texts[1], "비밀번호 관리법?");
        assert_eq!(texts[2], "첫 답변");
        assert_eq!(texts[3], "2단계 인증은?");
        assert_eq!(texts.iter().filter(|t| t.as_str() == "2단계 인증은?").count(), 1);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(session.len(), 4);
    }

    #[tokio::test]
    async fn history_window_limits_context() {
        let client = Arc::new(FakeChatClient::replying(["a", "b", "c"]));
        let settings = ChatSettings { history_window: 2, ..ChatSettings::default() };
        let agent = agent_with(client.clone(), settings);
        let mut session = Session::new();

        agent.chat_turn(&mut session, "one", None).await.unwrap();
        agent.chat_turn(&mut session, "two", None).await.unwrap();
        agent.chat_turn(&mut session, "three", None).await.unwrap();

        let request = client.last_request();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[1].text(), "two");
        assert_eq!(request.messages[2].text(), "b");
    }

    #[tokio::test]
    async fn failure_becomes_message_and_session_survives() {
        let client = Arc::new(FakeChatClient::default());
        client.push(Err(LlmError::Api { status: 500, body: "boom".into() }));
        client.push(Ok("recovered".into()));
        let agent = agent(client.clone());
        let mut session = Session::new();

        let failed = agent.chat_turn(&mut session, "hello", None).await.unwrap();
        assert!(matches!(&failed, Reply::Failed(msg) if msg.starts_with("오류가 발생했습니다:")));
        assert_eq!(session.len(), 2);

        let next = agent.chat_turn(&mut session, "again", None).await.unwrap();
        assert_eq!(next, Reply::Answer("recovered".into()));
    }

    #[tokio::test]
    async fn attached_images_travel_with_each_turn() {
        let client = Arc::new(FakeChatClient::replying(["두 이미지는 색이 다릅니다"]));
        let agent = agent(client.clone());
        let mut session = Session::new();

        let bad = ImageUpload { name: "broken.png".into(), data: STANDARD.encode(b"nope") };
        let outcome = agent.attach_images(&mut session, &[png_upload("a.png"), bad, png_upload("b.png")]);
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(
            outcome.notice.as_deref(),
            Some("2개의 이미지가 컨텍스트에 저장되었습니다. 이제 질문하세요.")
        );
        assert_eq!(session.len(), 1);

        agent.chat_turn(&mut session, "차이가 뭐야?", None).await.unwrap();
        let request = client.last_request();
        assert!(request.messages[0].text().contains("이미지 분석가"));
        let last = request.messages.last().unwrap();
        assert_eq!(last.content().image_count(), 2);
        assert_eq!(request.max_output_tokens, 1500);
        assert!(matches!(
            last.content(),
            MessageContent::Parts(parts) if matches!(&parts[1], ContentPart::Image { mime, .. } if mime == "image/jpeg")
        ));
    }

    #[test]
    fn missing_image_file_is_io_error() {
        let err = ChatAgent::load_images(&["/nonexistent/a.png"]).unwrap_err();
        assert!(matches!(err, AgentError::Io(_)));
    }

    #[tokio::test]
    async fn comparison_needs_two_images() {
        let agent = agent(Arc::new(FakeChatClient::default()));
        let err = agent.compare_images(&[encoded("a")]).await.unwrap_err();
        assert!(matches!(err, AgentError::NotEnoughImages(1)));
    }

    #[tokio::test]
    async fn comparison_uses_strict_table_request() {
        let client = Arc::new(FakeChatClient::replying(["I cannot make tables."]));
        let agent = agent(client.clone());

        let report = agent.compare_images(&[encoded("a"), encoded("b"), encoded("c"), encoded("d")]).await.unwrap();

        let request = client.last_request();
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_output_tokens, 200);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content().image_count(), 3);
        assert!(request.messages[1].text().contains("이미지 3"));
        assert!(report.table.contains("중성 색조"));
        assert!(report.filename.ends_with(".md"));
    }

    #[tokio::test]
    async fn short_document_is_not_sent() {
        let client = Arc::new(FakeChatClient::default());
        let agent = agent(client.clone());

        let outcome = agent
            .summarize_text("짧은 문서".to_string(), "memo.pdf", SummaryLength::Normal, SummaryLanguage::Korean, None)
            .await
            .unwrap();

        assert_eq!(client.request_count(), 0);
        assert!(matches!(outcome, SummaryOutcome::TooShort { original, .. } if original == "짧은 문서"));
    }

    #[tokio::test]
    async fn long_document_is_summarized_with_length_and_language() {
        let client = Arc::new(FakeChatClient::replying(["요약문"]));
        let agent = agent(client.clone());
        let text = "보안 ".repeat(400);

        let outcome = agent
            .summarize_text(text.clone(), "report.pdf", SummaryLength::Short, SummaryLanguage::English, Some(300))
            .await
            .unwrap();

        match outcome {
            SummaryOutcome::Summary { original, summary, document } => {
                assert_eq!(original, text);
                assert_eq!(summary, "요약문");
                assert!(document.filename.starts_with("report_요약_"));
                assert_eq!(&document.bytes[..2], b"PK");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let request = client.last_request();
        assert_eq!(request.max_output_tokens, 300);
        assert!(request.messages[0].text().contains("in English"));
        assert!(request.messages[1].text().starts_with("다음 텍스트를 요약해주세요:\n\n보안"));
    }

    #[tokio::test]
    async fn shots_grow_with_examples() {
        let client = Arc::new(FakeChatClient::replying(["꽥꽥!", "꽥꽥", "꽥꽥"]));
        let agent = agent(client.clone());

        let comparison = agent.compare_shots("오리").await.unwrap();
        assert_eq!(comparison.zero_shot, "꽥꽥!");

        let requests = client.requests.lock().unwrap();
        let lengths: Vec<usize> = requests.iter().map(|r| r.messages.len()).collect();
        assert_eq!(lengths, vec![2, 4, 8]);
        assert_eq!(requests[2].messages[1].text(), "참새");
        assert_eq!(requests[2].temperature, 0.9);
    }

    #[tokio::test]
    async fn ask_sends_system_and_prompt() {
        let client = Arc::new(FakeChatClient::replying(["아르헨티나"]));
        let agent = agent(client.clone());
        let answer = agent.ask("2022년 월드컵 우승 팀은 어디야?").await.unwrap();
        assert_eq!(answer, "아르헨티나");
        let request = client.last_request();
        assert_eq!(request.messages[0].text(), "You are a helpful assistant.");
        assert_eq!(request.messages.len(), 2);
    }
}
