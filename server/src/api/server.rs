//! API server initialization

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::routes::sse::SseState;
use super::routes::{diagnostics, events, graph, health, sse, transcript};
use crate::core::CoreApp;
use crate::core::constants::{DEFAULT_BODY_LIMIT, TOPIC_FRAMES, TOPIC_UPDATES};
use crate::domain::{ProjectionUpdate, RawFrame};

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self {
            app,
            allowed_origins,
        }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let router = build_router(&app, &allowed_origins)?;

        let listener = TcpListener::bind(addr).await?;
        tracing::debug!(%addr, "API server listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}

/// Assemble all routes over the app's topics and dashboard
pub fn build_router(app: &CoreApp, allowed_origins: &AllowedOrigins) -> Result<Router> {
    let frames = app
        .topics
        .stream_topic::<RawFrame>(TOPIC_FRAMES)
        .map_err(|e| anyhow::anyhow!("Failed to open frames topic: {}", e))?;
    let updates = app
        .topics
        .ephemeral_topic::<ProjectionUpdate>(TOPIC_UPDATES)
        .map_err(|e| anyhow::anyhow!("Failed to open updates topic: {}", e))?;

    let events_routes = events::routes(frames.publisher(), app.config.ingest.max_frame_bytes);

    let sse_routes = Router::new()
        .route("/", get(sse::sse))
        .with_state(SseState {
            updates,
            shutdown_rx: app.shutdown.subscribe(),
            keep_alive: Duration::from_secs(app.config.stream.keep_alive_secs),
        });

    let dashboard_routes = Router::new()
        .route("/api/v1/transcript", get(transcript::transcript))
        .route("/api/v1/diagnostics", get(diagnostics::diagnostics))
        .with_state(app.dashboard.clone());

    let router = Router::new()
        .route("/api/v1/health", get(health::health))
        .nest("/api/v1/events", events_routes)
        .nest("/api/v1/graph", graph::routes(app.dashboard.clone()))
        .nest("/api/v1/sse", sse_routes)
        .merge(dashboard_routes)
        .fallback(middleware::handle_404)
        .layer(CompressionLayer::new())
        .layer(middleware::cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    Ok(router)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::core::config::{
        AppConfig, IngestConfig, KnowledgeConfig, ServerConfig, StreamConfig,
    };
    use crate::core::{ShutdownService, TopicConfig, TopicService};
    use crate::domain::{
        DashboardService, KnowledgeBase, PayloadAnalyzer, ProjectionSession, StepInspector,
    };

    fn make_app(ingest: IngestConfig) -> CoreApp {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5390,
            },
            ingest,
            stream: StreamConfig { keep_alive_secs: 15 },
            knowledge: KnowledgeConfig::default(),
            debug: false,
        };
        let knowledge = Arc::new(KnowledgeBase::builtin());
        let dashboard = Arc::new(DashboardService::new(
            ProjectionSession::new(config.ingest.max_frame_bytes),
            StepInspector::new(PayloadAnalyzer::new(knowledge.clone())),
        ));
        let topics = Arc::new(TopicService::with_config(TopicConfig::from(&config.ingest)));
        CoreApp {
            shutdown: ShutdownService::new(topics.clone()),
            config,
            topics,
            dashboard,
            knowledge,
        }
    }

    fn router(app: &CoreApp) -> Router {
        let origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        build_router(app, &origins).unwrap()
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn post_frame(router: &Router, body: &str) -> StatusCode {
        router
            .clone()
            .oneshot(
                Request::post("/api/v1/events")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    async fn wait_for_events(app: &CoreApp, count: usize) {
        for _ in 0..100 {
            if app.dashboard.diagnostics().events >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("pipeline did not fold {} events", count);
    }

    #[tokio::test]
    async fn test_health() {
        let app = make_app(IngestConfig::default());
        let (status, body) = get_json(&router(&app), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_initial_graph_has_seeded_agents() {
        let app = make_app(IngestConfig::default());
        let (status, body) = get_json(&router(&app), "/api/v1/graph").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(body["edges"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_posted_frames_reach_graph_and_transcript() {
        let app = make_app(IngestConfig::default());
        app.start_background_tasks().await.unwrap();
        let router = router(&app);

        let call = r#"{"type":"orchestrator_message","data":{"tool_calls":[{"name":"kali_nmap","args":{"command":"nmap -sV -Pn 10.0.0.1"}}]}}"#;
        let result = r#"{"type":"tool_result","data":{"tool_name":"kali_nmap","content":"80/tcp open"}}"#;
        assert_eq!(post_frame(&router, call).await, StatusCode::ACCEPTED);
        assert_eq!(post_frame(&router, result).await, StatusCode::ACCEPTED);
        wait_for_events(&app, 2).await;

        let (_, graph) = get_json(&router, "/api/v1/graph").await;
        let tool = graph["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["kind"] == "tool")
            .cloned()
            .unwrap();
        assert_eq!(tool["status"], "success");

        let uri = format!("/api/v1/graph/steps/{}", tool["id"].as_str().unwrap());
        let (status, step) = get_json(&router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(step["logs"], "80/tcp open");

        let (_, transcript) = get_json(&router, "/api/v1/transcript").await;
        assert_eq!(transcript.as_array().unwrap().len(), 2);

        app.shutdown.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_step_is_404() {
        let app = make_app(IngestConfig::default());
        let (status, body) = get_json(&router(&app), "/api/v1/graph/steps/tool_404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NODE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_seeded_node_without_record_uses_placeholders() {
        let app = make_app(IngestConfig::default());
        let (status, body) = get_json(&router(&app), "/api/v1/graph/steps/web_agent").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["analysis"].is_null());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_413() {
        let app = make_app(IngestConfig {
            max_frame_bytes: 32,
            ..IngestConfig::default()
        });
        let body = format!(r#"{{"type":"ack","data":"{}"}}"#, "x".repeat(64));
        assert_eq!(
            post_frame(&router(&app), &body).await,
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_full_buffer_is_503_with_retry_after() {
        let app = make_app(IngestConfig {
            max_frame_bytes: 64,
            buffer_bytes: 32,
            channel_capacity: 16,
        });
        let frame = "x".repeat(40);

        let response = router(&app)
            .clone()
            .oneshot(Request::post("/api/v1/events").body(Body::from(frame)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["retry-after"], "1");
    }

    #[tokio::test]
    async fn test_frames_after_shutdown_are_refused() {
        let app = make_app(IngestConfig::default());
        app.start_background_tasks().await.unwrap();
        let router = router(&app);
        app.shutdown.shutdown().await;

        let frame = r#"{"type":"orchestrator_message","data":{"content":"late"}}"#;
        assert_eq!(
            post_frame(&router, frame).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(app.dashboard.diagnostics().events, 0);
    }

    #[tokio::test]
    async fn test_malformed_frames_count_as_dropped() {
        let app = make_app(IngestConfig::default());
        app.start_background_tasks().await.unwrap();
        let router = router(&app);

        assert_eq!(post_frame(&router, "{not json").await, StatusCode::ACCEPTED);
        assert_eq!(post_frame(&router, r#"{"type":"ack"}"#).await, StatusCode::ACCEPTED);
        for _ in 0..100 {
            let diagnostics = app.dashboard.diagnostics();
            if diagnostics.dropped + diagnostics.acks == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let (_, body) = get_json(&router, "/api/v1/diagnostics").await;
        assert_eq!(body["dropped"], 1);
        assert_eq!(body["acks"], 1);
        assert_eq!(body["events"], 0);

        app.shutdown.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = make_app(IngestConfig::default());
        let (status, _) = get_json(&router(&app), "/api/v1/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
