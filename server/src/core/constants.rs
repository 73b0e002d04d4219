// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "AgentDeck";

/// Application name in lowercase (for paths and log targets)
pub const APP_NAME_LOWER: &str = "agentdeck";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".agentdeck";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "agentdeck.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "AGENTDECK_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "AGENTDECK_DEBUG";

/// Environment variable for server host
pub const ENV_HOST: &str = "AGENTDECK_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "AGENTDECK_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "AGENTDECK_LOG";

/// Environment variable for the knowledge override file
pub const ENV_KNOWLEDGE_PATH: &str = "AGENTDECK_KNOWLEDGE_PATH";

/// Environment variable for the maximum accepted frame size
pub const ENV_MAX_FRAME_BYTES: &str = "AGENTDECK_MAX_FRAME_BYTES";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Ingestion
// =============================================================================

/// Largest telemetry frame accepted (1 MB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Bytes of frames allowed in flight before publishers get backpressure (16 MB)
pub const DEFAULT_INGEST_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Topic channel capacity (message count)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Retry-After header value for backpressure (in seconds)
pub const BACKPRESSURE_RETRY_AFTER_SECS: u64 = 1;

// =============================================================================
// Topic Names
// =============================================================================

/// Raw frames from the HTTP ingest endpoint
pub const TOPIC_FRAMES: &str = "frames";

/// Projection updates fanned out to SSE clients
pub const TOPIC_UPDATES: &str = "updates";

// =============================================================================
// Streaming
// =============================================================================

/// SSE keep-alive interval in seconds
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

// =============================================================================
// HTTP
// =============================================================================

/// Request body limit for routes other than ingest (64 KB)
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
