//! Core application

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, ReplayView};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, TOPIC_FRAMES, TOPIC_UPDATES};
use crate::core::shutdown::ShutdownService;
use crate::core::{TopicConfig, TopicService};
use crate::domain::{
    DashboardService, FramePipeline, KnowledgeBase, PayloadAnalyzer, ProjectionSession,
    ProjectionUpdate, RawFrame, StepInspector,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub topics: Arc<TopicService>,
    pub dashboard: Arc<DashboardService>,
    pub knowledge: Arc<KnowledgeBase>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Replay { file, view, node }) => {
                return Self::replay(&cli_config, &file, view, node.as_deref());
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config)?;
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let knowledge = Arc::new(load_knowledge(&config)?);

        let analyzer = PayloadAnalyzer::new(knowledge.clone());
        let dashboard = Arc::new(DashboardService::new(
            ProjectionSession::new(config.ingest.max_frame_bytes),
            StepInspector::new(analyzer),
        ));

        let topics = Arc::new(TopicService::with_config(TopicConfig::from(&config.ingest)));
        let shutdown = ShutdownService::new(topics.clone());

        Ok(Self {
            shutdown,
            config,
            topics,
            dashboard,
            knowledge,
        })
    }

    /// Fold a recorded frame file and print the requested view.
    fn replay(cli: &CliConfig, file: &Path, view: ReplayView, node: Option<&str>) -> Result<()> {
        let config = AppConfig::load(cli)?;
        let knowledge = Arc::new(load_knowledge(&config)?);
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read frame file: {}", file.display()))?;

        let session = replay_frames(&content, config.ingest.max_frame_bytes);
        let inspector = StepInspector::new(PayloadAnalyzer::new(knowledge));
        println!("{}", render_replay(&session, &inspector, view, node)?);
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await?;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            app.knowledge.len(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) -> Result<()> {
        let frames = self
            .topics
            .stream_topic::<RawFrame>(TOPIC_FRAMES)
            .and_then(|topic| topic.subscribe())
            .map_err(|e| anyhow::anyhow!("Failed to subscribe to frames topic: {}", e))?;
        let updates = self
            .topics
            .ephemeral_topic::<ProjectionUpdate>(TOPIC_UPDATES)
            .map_err(|e| anyhow::anyhow!("Failed to create updates topic: {}", e))?;

        let pipeline = FramePipeline::new(self.dashboard.clone(), updates.publisher());
        self.shutdown
            .register(pipeline.start(frames, self.shutdown.subscribe()))
            .await;

        tracing::debug!("Background tasks started");
        Ok(())
    }
}

fn load_knowledge(config: &AppConfig) -> Result<KnowledgeBase> {
    match &config.knowledge.path {
        Some(path) => KnowledgeBase::load_with_overrides(path)
            .context("Failed to load tool knowledge"),
        None => Ok(KnowledgeBase::builtin()),
    }
}

/// Fold one frame per non-blank line, using the line index as receipt time.
fn replay_frames(content: &str, max_frame_bytes: usize) -> ProjectionSession {
    let mut session = ProjectionSession::new(max_frame_bytes);
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = session.ingest_at(line, index as i64) {
            tracing::warn!(line = index + 1, error = %e, "Skipped frame");
        }
    }
    session
}

fn render_replay(
    session: &ProjectionSession,
    inspector: &StepInspector,
    view: ReplayView,
    node: Option<&str>,
) -> Result<String> {
    let json = match view {
        ReplayView::Graph => serde_json::to_string_pretty(session.graph())?,
        ReplayView::Transcript => serde_json::to_string_pretty(session.transcript())?,
        ReplayView::Diagnostics => serde_json::to_string_pretty(&session.diagnostics())?,
        ReplayView::Step => {
            let node = node.context("--node is required with --view step")?;
            let inspection = inspector
                .inspect(session.graph(), node)
                .with_context(|| format!("Unknown node: {}", node))?;
            serde_json::to_string_pretty(&inspection)?
        }
    };
    Ok(json)
}
