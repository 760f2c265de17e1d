use clap::{ Parser, Subcommand };
use std::path::PathBuf;

use crate::models::options::{ Creativity, SummaryLanguage, SummaryLength };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai", global = true)]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL", global = true)] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Required for OpenAI.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true, global = true)]
    pub api_key: String,

    /// Model identifier for chat completion (e.g., gpt-4o, gpt-3.5-turbo, llama3)
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4o", global = true)]
    pub model: String,

    /// Sampling temperature, 0.0 to 2.0.
    #[arg(long, env = "TEMPERATURE", default_value = "0.7", global = true)]
    pub temperature: f32,

    /// Upper bound on tokens generated per reply.
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value = "1000", global = true)]
    pub max_output_tokens: u32,

    /// Number of most recent transcript messages sent with each chat request.
    #[arg(long, env = "HISTORY_WINDOW", default_value = "10", global = true)]
    pub history_window: usize,

    /// Comma-separated, case-insensitive terms that make the assistant refuse a message.
    #[arg(long, env = "FORBIDDEN_KEYWORDS", default_value = "", global = true)]
    pub forbidden_keywords: String,

    /// HTTP timeout for LLM calls, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "120", global = true)]
    pub request_timeout_secs: u64,

    // --- General App Args ---
    /// Path to the prompt catalogue file.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json", global = true)]
    pub prompts_path: String,

    /// Directory where exported reports are written. Defaults to the desktop.
    #[arg(long, env = "EXPORT_DIR", global = true)]
    pub export_dir: Option<PathBuf>,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional port for the HTTP admin API.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must sign requests with it.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the WebSocket chat server (default).
    Serve,
    /// Send a single prompt with the default assistant instruction and print the reply.
    Ask {
        prompt: String,
    },
    /// Answer the same question zero-shot, one-shot and few-shot.
    Shots {
        #[arg(default_value = "오리")]
        question: String,
    },
    /// Summarize a PDF and save the summary as a DOCX document.
    Summarize {
        pdf: PathBuf,
        #[arg(long, value_enum, default_value_t = SummaryLength::Normal)]
        length: SummaryLength,
        #[arg(long, value_enum, default_value_t = SummaryLanguage::Korean)]
        language: SummaryLanguage,
        /// Overrides MAX_OUTPUT_TOKENS for the summary (100 to 2000).
        #[arg(long, value_parser = clap::value_parser!(u32).range(100..=2000))]
        max_tokens: Option<u32>,
    },
    /// Compare two or three images and save the difference table as markdown.
    Compare {
        #[arg(required = true, num_args = 2..=3)]
        images: Vec<PathBuf>,
    },
    /// Chat once at a creativity preset instead of the configured temperature.
    Chat {
        message: String,
        #[arg(long, value_enum, default_value_t = Creativity::Balanced)]
        creativity: Creativity,
    },
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("TEMPERATURE must be within [0, 2], got {}", self.temperature));
        }
        if self.max_output_tokens == 0 {
            return Err("MAX_OUTPUT_TOKENS must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_subcommand() {
        let args = parse(&["session-agent", "--api-key", "k"]);
        assert!(args.command.is_none());
        assert_eq!(args.history_window, 10);
        assert_eq!(args.model, "gpt-4o");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn compare_requires_two_images() {
        assert!(Args::try_parse_from(["session-agent", "compare", "a.png"]).is_err());
        let args = parse(&["session-agent", "compare", "a.png", "b.jpg"]);
        assert!(matches!(args.command, Some(Command::Compare { images }) if images.len() == 2));
    }

    #[test]
    fn summarize_parses_enums() {
        let args = parse(&["session-agent", "summarize", "doc.pdf", "--length", "short", "--language", "english"]);
        match args.command {
            Some(Command::Summarize { length, language, max_tokens, .. }) => {
                assert_eq!(length, SummaryLength::Short);
                assert_eq!(language, SummaryLanguage::English);
                assert_eq!(max_tokens, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let args = parse(&["session-agent", "--temperature", "2.5"]);
        assert!(args.validate().is_err());
    }
}
