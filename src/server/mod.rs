pub mod api;
pub mod websocket;

use crate::agent::ChatAgent;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Server {
    addr: String,
    agent: Arc<Mutex<ChatAgent>>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<Mutex<ChatAgent>>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, self.agent.clone(), self.args.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let tls_acceptor = websocket::tls_acceptor(
            self.args.enable_tls,
            self.args.tls_cert_path.as_deref(),
            self.args.tls_key_path.as_deref()
        )?;
        let api_key = self.args.server_api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_some() {
            log::info!("WebSocket clients must sign their handshake (ts/sig)");
        }
        websocket::start_ws_server(&self.addr, self.agent.clone(), api_key, tls_acceptor).await
    }
}
