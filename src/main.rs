use clap::Parser;
use dotenv::dotenv;
use log::{ error, info };
use session_agent::cli::Args;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = args.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    info!("--- Core Configuration ---");
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.model);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("(default)"));
    info!("API Key Set: {}", !args.api_key.is_empty());
    info!("Temperature: {}", args.temperature);
    info!("Max Output Tokens: {}", args.max_output_tokens);
    info!("History Window: {}", args.history_window);
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("Prompts Path: {}", args.prompts_path);
    if matches!(args.command, None | Some(session_agent::cli::Command::Serve)) {
        info!("Server Address: {}", args.server_addr);
        info!("HTTP API Port: {:?}", args.http_port);
        info!("TLS Enabled: {}", args.enable_tls);
    }
    info!("-------------------------");

    session_agent::run(args).await
}
