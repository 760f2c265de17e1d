use crate::agent::ChatAgent;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use axum::{ routing::get, Router, extract::State, response::IntoResponse, http::StatusCode };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: String,
    model: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<Mutex<ChatAgent>>,
    args: Args,
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<Mutex<ChatAgent>>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(AppState { agent, args: args.clone() });

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;

            tokio::spawn(async move {
                let result = axum_server
                    ::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service()).await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });

            info!("HTTPS server started with TLS enabled");
        }
        _ => {
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });

            info!("HTTP server started");
        }
    }

    Ok(())
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut agent = match state.agent.try_lock() {
        Ok(g) => g,
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(ReloadResponse {
                    success: false,
                    message: "Agent busy".into(),
                }),
            ).into_response();
        }
    };

    let (code, success, message) = match agent.reload_prompts_if_changed(&state.args).await {
        Ok(true) => (StatusCode::OK, true, "Prompts reloaded".to_string()),
        Ok(false) => (StatusCode::OK, true, "Prompts unchanged".to_string()),
        Err(e) => {
            error!("Prompt reload failed: {}", e);
            (StatusCode::BAD_REQUEST, false, format!("Reload error: {}", e))
        }
    };

    (code, axum::Json(ReloadResponse { success, message })).into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let agent = state.agent.lock().await;
    axum::Json(HealthResponse {
        status: "ok",
        backend: agent.backend().to_string(),
        model: agent.model(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ChatSettings;
    use crate::config::prompt::shipped;
    use crate::llm::chat::fake::FakeChatClient;
    use crate::session::KeywordPolicy;
    use clap::Parser;
    use std::io::Write;

    fn state(prompts_path: &str) -> AppState {
        let agent = ChatAgent::with_client(
            Arc::new(FakeChatClient::default()),
            Arc::new(shipped()),
            KeywordPolicy::default(),
            ChatSettings::default()
        );
        let args = Args::try_parse_from(["session-agent", "--prompts-path", prompts_path]).unwrap();
        AppState { agent: Arc::new(Mutex::new(agent)), args }
    }

    #[tokio::test]
    async fn health_reports_model() {
        let response = health_handler(State(state("json/prompts.json"))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reload_picks_up_new_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(include_str!("../../json/prompts.json").as_bytes()).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let response = reload_prompts_handler(State(state(&path))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reload_reports_missing_file() {
        let response = reload_prompts_handler(State(state("/nonexistent/prompts.json"))).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn busy_agent_is_reported() {
        let state = state("json/prompts.json");
        let _guard = state.agent.lock().await;
        let response = reload_prompts_handler(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
