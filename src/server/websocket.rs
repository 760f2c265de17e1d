use crate::agent::{ ChatAgent, Reply };
use crate::models::chat::TranscriptEntry;
use crate::models::options::Creativity;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::Session;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::net::{ TcpListener, TcpStream };
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls_pemfile::{ certs, private_key };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use hmac::{ Hmac, Mac };
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{ info, warn, error };
use futures::{ Sink, SinkExt, StreamExt };
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;
type Params = HashMap<String, String>;

/// Large enough for three base64 encoded photos in one upload frame.
const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;
const MAX_CLOCK_SKEW_SECS: u64 = 300;
const CONNECTIONS_PER_SECOND: u32 = 10;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(
            Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN))
        );
}

fn open_pem(path: &str) -> Result<BufReader<File>, Box<dyn Error + Send + Sync>> {
    let file = File::open(path).map_err(|e| format!("Failed to open '{}': {}", path, e))?;
    Ok(BufReader::new(file))
}

/// WSS acceptor from PEM files, or `None` when TLS is off. Any key type rustls accepts is fine.
pub(crate) fn tls_acceptor(
    enable_tls: bool,
    cert_path: Option<&str>,
    key_path: Option<&str>
) -> Result<Option<TlsAcceptor>, Box<dyn Error + Send + Sync>> {
    if !enable_tls {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        return Ok(None);
    }
    let (Some(cert_path), Some(key_path)) = (cert_path, key_path) else {
        error!("ENABLE_TLS requires both TLS_CERT_PATH and TLS_KEY_PATH");
        return Err("TLS enabled without certificate and key".into());
    };

    let cert_chain = certs(&mut open_pem(cert_path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Invalid certificate in '{}': {}", cert_path, e))?;
    let key = private_key(&mut open_pem(key_path)?)
        .map_err(|e| format!("Invalid private key in '{}': {}", key_path, e))?
        .ok_or_else(|| format!("No private key found in '{}'", key_path))?;

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    info!("Serving WSS with certificate '{}'", cert_path);
    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<Mutex<ChatAgent>>,
    api_key: Option<String>,
    tls_acceptor: Option<TlsAcceptor>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let socket = TcpListener::bind(addr).await?;
    info!("{} server listening on: {}", if tls_acceptor.is_some() { "WSS" } else { "WS" }, addr);

    let listener = Arc::new(Listener { agent, api_key, tls: tls_acceptor });
    loop {
        let (stream, peer) = socket.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let listener = Arc::clone(&listener);
        tokio::spawn(async move {
            if let Err(e) = listener.serve(stream, peer).await {
                error!("Connection {} failed: {}", peer, e);
            }
        });
    }
}

/// Everything a connection task needs before the WebSocket upgrade.
struct Listener {
    agent: Arc<Mutex<ChatAgent>>,
    api_key: Option<String>,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    async fn serve(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), Box<dyn Error + Send + Sync>> {
        match &self.tls {
            Some(acceptor) => {
                let stream = acceptor.accept(stream).await?;
                self.upgrade(stream, peer).await
            }
            None => self.upgrade(stream, peer).await,
        }
    }

    /// Completes the handshake, checking the signature when an API key is configured.
    /// `?mode=vision` opens the connection with the image-chat greeting.
    async fn upgrade<S>(&self, stream: S, peer: SocketAddr) -> Result<(), Box<dyn Error + Send + Sync>>
        where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
    {
        let mut vision = false;
        let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let params = query_params(req.uri().query().unwrap_or(""));
            vision = is_vision_mode(&params);

            let Some(secret) = self.api_key.as_deref() else {
                return Ok(response);
            };
            match authorize(secret, &params, Utc::now().timestamp()) {
                Ok(()) => Ok(response),
                Err(reason) => {
                    warn!("Rejected handshake from {}: {}", peer, reason);
                    Err(unauthorized(reason))
                }
            }
        };

        let ws = accept_hdr_async(stream, callback).await?;
        handle_connection(peer, ws, Arc::clone(&self.agent), vision).await;
        Ok(())
    }
}

fn query_params(query: &str) -> Params {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

fn is_vision_mode(params: &Params) -> bool {
    params.get("mode").is_some_and(|mode| mode.eq_ignore_ascii_case("vision"))
}

fn unauthorized(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

fn authorize(secret: &str, params: &Params, now: i64) -> Result<(), &'static str> {
    let ts = params.get("ts").or_else(|| params.get("X-Api-Ts"));
    let sig = params.get("sig").or_else(|| params.get("X-Api-Sign"));
    match (ts, sig) {
        (Some(ts), Some(sig)) => verify_signature(secret, ts, sig, now),
        _ => Err("missing ts/sig"),
    }
}

/// Checks `sig == hex(HMAC-SHA256(secret, ts))` and that `ts` is within five minutes of `now`.
pub(crate) fn verify_signature(secret: &str, ts: &str, sig: &str, now: i64) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "invalid timestamp")?;
    if ts_i.abs_diff(now) > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid key")?;
    mac.update(ts.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if expected == sig { Ok(()) } else { Err("bad signature") }
}

async fn send<T>(tx: &mut T, peer: SocketAddr, msg: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: std::fmt::Display
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize frame for {}: {}", peer, e);
            return true;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending to {}: {}", peer, e);
            false
        }
    }
}

/// State owned by one connection. Nothing here is shared with other connections.
pub(crate) struct ConnectionState {
    session: Session,
    creativity: Creativity,
    vision: bool,
}

impl ConnectionState {
    pub(crate) fn new(vision: bool) -> Self {
        Self {
            session: Session::new(),
            creativity: Creativity::default(),
            vision,
        }
    }

    fn greeting(&self, agent: &ChatAgent) -> Option<ServerMessage> {
        agent
            .greeting(self.vision)
            .ok()
            .map(|content| ServerMessage::Notice { content: content.to_string() })
    }

    fn last_timestamp(&self) -> i64 {
        self.session
            .messages()
            .last()
            .map(|m| m.timestamp())
            .unwrap_or_else(|| Utc::now().timestamp())
    }

    /// Runs one client request to completion and returns the frames to send back.
    pub(crate) async fn handle(&mut self, agent: &ChatAgent, msg: ClientMessage) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Chat { content } => {
                let reply = agent.chat_turn(
                    &mut self.session,
                    &content,
                    Some(self.creativity.temperature())
                ).await;
                let timestamp = self.last_timestamp();
                match reply {
                    Ok(Reply::Refused(content)) => vec![ServerMessage::Refused { content, timestamp }],
                    Ok(Reply::Answer(content) | Reply::Failed(content)) =>
                        vec![ServerMessage::Response { content, timestamp }],
                    Err(e) => vec![ServerMessage::Error { message: e.to_string() }],
                }
            }
            ClientMessage::Upload { images } => {
                if images.is_empty() {
                    return vec![ServerMessage::Error { message: "No images in upload".to_string() }];
                }
                let outcome = agent.attach_images(&mut self.session, &images);
                let mut frames: Vec<ServerMessage> = outcome.warnings
                    .into_iter()
                    .map(|warning| ServerMessage::Error { message: warning })
                    .collect();
                if let Some(content) = outcome.notice {
                    frames.push(ServerMessage::Notice { content });
                }
                frames
            }
            ClientMessage::Compare => {
                let images = self.session.attachments().to_vec();
                match agent.compare_images(&images).await {
                    Ok(report) =>
                        vec![ServerMessage::Analysis {
                            markdown: report.markdown,
                            filename: report.filename,
                        }],
                    Err(e) => {
                        warn!("Image comparison failed: {}", e);
                        vec![ServerMessage::Error { message: e.to_string() }]
                    }
                }
            }
            ClientMessage::Creativity { level } =>
                match level.parse::<Creativity>() {
                    Ok(creativity) => {
                        self.creativity = creativity;
                        vec![ServerMessage::Notice {
                            content: format!(
                                "창의성 레벨: {} (temperature {})",
                                creativity.label(),
                                creativity.temperature()
                            ),
                        }]
                    }
                    Err(e) => vec![ServerMessage::Error { message: e.to_string() }],
                }
            ClientMessage::Reset => {
                self.session = Session::new();
                self.greeting(agent).into_iter().collect()
            }
            ClientMessage::History =>
                vec![ServerMessage::History {
                    messages: self.session.messages().iter().map(TranscriptEntry::from).collect(),
                }],
        }
    }
}

fn needs_model(msg: &ClientMessage) -> bool {
    matches!(msg, ClientMessage::Chat { .. } | ClientMessage::Compare)
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<Mutex<ChatAgent>>,
    vision: bool
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let session_id = Uuid::new_v4();
    info!("Assigned session {} to {} (vision: {})", session_id, peer, vision);

    let mut state = ConnectionState::new(vision);
    let initial = {
        let agent = agent.lock().await;
        state.greeting(&agent)
    };
    if let Some(greeting) = initial {
        if !send(&mut tx, peer, &greeting).await {
            return;
        }
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                error!("Error receiving message from {}: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!("Message from {} exceeds size limit ({} > {})", peer, message.len(), MAX_MESSAGE_SIZE);
            let error_msg = ServerMessage::Error { message: "Message too large".to_string() };
            send(&mut tx, peer, &error_msg).await;
            break;
        }

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Client {} disconnected", peer);
                break;
            }
            Message::Binary(_) => {
                let error_msg = ServerMessage::Error {
                    message: "Binary frames are not supported".to_string(),
                };
                if !send(&mut tx, peer, &error_msg).await {
                    break;
                }
                continue;
            }
            _ => {
                continue;
            }
        };

        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(client_msg) => client_msg,
            Err(e) => {
                warn!("Invalid frame from {}: {}", peer, e);
                let error_msg = ServerMessage::Error { message: format!("Invalid message: {}", e) };
                if !send(&mut tx, peer, &error_msg).await {
                    break;
                }
                continue;
            }
        };

        if needs_model(&client_msg) && !send(&mut tx, peer, &ServerMessage::Processing).await {
            break;
        }

        let agent_snapshot = agent.lock().await.clone();
        let frames = state.handle(&agent_snapshot, client_msg).await;

        let mut open = true;
        for frame in &frames {
            if !send(&mut tx, peer, frame).await {
                open = false;
                break;
            }
        }
        if !open {
            break;
        }
    }

    info!("Session {} for {} closed after {} messages", session_id, peer, state.session.len());
}
