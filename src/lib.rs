pub mod agent;
pub mod cli;
pub mod config;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod report;
pub mod server;
pub mod session;

use agent::{ ChatAgent, Reply, SummaryOutcome };
use cli::{ Args, Command };
use log::info;
use report::export;
use server::Server;
use session::Session;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

fn export_dir(args: &Args) -> PathBuf {
    args.export_dir.clone().unwrap_or_else(export::default_export_dir)
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let agent = ChatAgent::new(&args)?;

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = args.server_addr.clone();
            info!("Starting server on: {}", addr);
            let server = Server::new(addr, Arc::new(Mutex::new(agent)), args);
            server.run().await?;
        }
        Command::Ask { prompt } => {
            println!("{}", agent.ask(&prompt).await?);
        }
        Command::Chat { message, creativity } => {
            info!("Creativity: {} (temperature {})", creativity.label(), creativity.temperature());
            let mut session = Session::new();
            match agent.chat_turn(&mut session, &message, Some(creativity.temperature())).await? {
                Reply::Answer(text) | Reply::Refused(text) => println!("{}", text),
                Reply::Failed(text) => {
                    return Err(text.into());
                }
            }
        }
        Command::Shots { question } => {
            let shots = agent.compare_shots(&question).await?;
            println!("[Zero-shot]\n{}\n", shots.zero_shot);
            println!("[One-shot]\n{}\n", shots.one_shot);
            println!("[Few-shot]\n{}", shots.few_shot);
        }
        Command::Summarize { pdf, length, language, max_tokens } => {
            let bytes = fs::read(&pdf)?;
            let filename = pdf
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            info!("Summarizing {} ({})", pdf.display(), ingest::image::format_size_mb(bytes.len()));

            match agent.summarize_document(&bytes, &filename, length, language, max_tokens).await? {
                SummaryOutcome::TooShort { notice, original } => {
                    println!("{}\n\n{}", notice, original);
                }
                SummaryOutcome::Summary { original, summary, document } => {
                    println!("{}", summary);
                    info!(
                        "Source: {} characters, ~{} pages, {} words",
                        original.chars().count(),
                        ingest::pdf::estimate_pages(&original),
                        ingest::pdf::word_count(&original)
                    );
                    let path = export::save(&export_dir(&args), &document.filename, &document.bytes)?;
                    println!("\n저장됨: {}", path.display());
                }
            }
        }
        Command::Compare { images } => {
            let encoded = ChatAgent::load_images(&images)?;
            let report = agent.compare_images(&encoded).await?;
            println!("{}", report.table_section());
            let path = export::save(&export_dir(&args), &report.filename, report.markdown.as_bytes())?;
            println!("\n저장됨: {}", path.display());
        }
    }

    Ok(())
}
