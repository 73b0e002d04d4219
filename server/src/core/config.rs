use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CHANNEL_CAPACITY, DEFAULT_HOST,
    DEFAULT_INGEST_BUFFER_BYTES, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Frame ingestion section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub max_frame_bytes: Option<usize>,
    pub buffer_bytes: Option<usize>,
    pub channel_capacity: Option<usize>,
}

/// SSE streaming section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StreamFileConfig {
    pub keep_alive_secs: Option<u64>,
}

/// Tool knowledge section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct KnowledgeFileConfig {
    pub path: Option<PathBuf>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub stream: Option<StreamFileConfig>,
    pub knowledge: Option<KnowledgeFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            if ingest.max_frame_bytes.is_some() {
                current.max_frame_bytes = ingest.max_frame_bytes;
            }
            if ingest.buffer_bytes.is_some() {
                current.buffer_bytes = ingest.buffer_bytes;
            }
            if ingest.channel_capacity.is_some() {
                current.channel_capacity = ingest.channel_capacity;
            }
        }

        if let Some(stream) = other.stream
            && stream.keep_alive_secs.is_some()
        {
            let current = self.stream.get_or_insert_with(StreamFileConfig::default);
            current.keep_alive_secs = stream.keep_alive_secs;
        }

        if let Some(knowledge) = other.knowledge
            && knowledge.path.is_some()
        {
            let current = self
                .knowledge
                .get_or_insert_with(KnowledgeFileConfig::default);
            current.path = knowledge.path;
        }

        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Frame ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_frame_bytes: usize,
    /// Byte budget of the frames topic
    pub buffer_bytes: usize,
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            buffer_bytes: DEFAULT_INGEST_BUFFER_BYTES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// SSE streaming configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub keep_alive_secs: u64,
}

/// Tool knowledge configuration
#[derive(Debug, Clone, Default)]
pub struct KnowledgeConfig {
    /// Optional override file merged over the built-in table
    pub path: Option<PathBuf>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub stream: StreamConfig,
    pub knowledge: KnowledgeConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.agentdeck/agentdeck.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(path);
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(file_config, cli);
        config.validate()?;
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn layer(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();
        let file_stream = file_config.stream.unwrap_or_default();
        let file_knowledge = file_config.knowledge.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        let ingest = IngestConfig {
            max_frame_bytes: cli
                .max_frame_bytes
                .or(file_ingest.max_frame_bytes)
                .unwrap_or(DEFAULT_MAX_FRAME_BYTES),
            buffer_bytes: file_ingest
                .buffer_bytes
                .unwrap_or(DEFAULT_INGEST_BUFFER_BYTES),
            channel_capacity: file_ingest
                .channel_capacity
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        };

        let stream = StreamConfig {
            keep_alive_secs: file_stream
                .keep_alive_secs
                .unwrap_or(DEFAULT_KEEP_ALIVE_SECS),
        };

        let knowledge = KnowledgeConfig {
            path: cli
                .knowledge
                .clone()
                .or(file_knowledge.path)
                .map(|p| expand_path(&p)),
        };

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        Self {
            server,
            ingest,
            stream,
            knowledge,
            debug,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.ingest.max_frame_bytes == 0 {
            anyhow::bail!("Configuration error: ingest.max_frame_bytes must be greater than 0");
        }
        if self.ingest.channel_capacity == 0 {
            anyhow::bail!("Configuration error: ingest.channel_capacity must be greater than 0");
        }
        // A frame that passes the size check must also fit the topic budget
        if self.ingest.buffer_bytes < self.ingest.max_frame_bytes {
            anyhow::bail!(
                "Configuration error: ingest.buffer_bytes ({}) must be at least ingest.max_frame_bytes ({})",
                self.ingest.buffer_bytes,
                self.ingest.max_frame_bytes
            );
        }
        if self.stream.keep_alive_secs == 0 {
            anyhow::bail!("Configuration error: stream.keep_alive_secs must be greater than 0");
        }
        Ok(())
    }
}

/// Get the profile config path (~/.agentdeck/agentdeck.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the home directory.
fn expand_path(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(json: &str) -> FileConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_file_config_parse_full() {
        let config = parse(
            r#"{
                "server": { "host": "0.0.0.0", "port": 8080 },
                "ingest": { "max_frame_bytes": 2048, "buffer_bytes": 65536, "channel_capacity": 16 },
                "stream": { "keep_alive_secs": 5 },
                "knowledge": { "path": "/etc/agentdeck/tools.json" },
                "debug": true
            }"#,
        );

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(8080));
        let ingest = config.ingest.as_ref().unwrap();
        assert_eq!(ingest.max_frame_bytes, Some(2048));
        assert_eq!(ingest.channel_capacity, Some(16));
        assert_eq!(config.stream.as_ref().unwrap().keep_alive_secs, Some(5));
        assert_eq!(
            config.knowledge.as_ref().unwrap().path,
            Some(PathBuf::from("/etc/agentdeck/tools.json"))
        );
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config = parse("{}");
        assert!(config.server.is_none());
        assert!(config.ingest.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let config = parse(r#"{ "server": { "host": "localhost" }, "sevrer": 123 }"#);
        assert_eq!(config.extra.get("sevrer").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = parse(
            r#"{ "server": { "host": "base", "port": 1000 }, "ingest": { "max_frame_bytes": 10 } }"#,
        );
        base.merge(parse(
            r#"{ "server": { "port": 2000 }, "ingest": { "channel_capacity": 3 }, "debug": true }"#,
        ));

        let server = base.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("base"));
        assert_eq!(server.port, Some(2000));
        let ingest = base.ingest.as_ref().unwrap();
        assert_eq!(ingest.max_frame_bytes, Some(10));
        assert_eq!(ingest.channel_capacity, Some(3));
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn test_layer_defaults() {
        let config = AppConfig::layer(FileConfig::default(), &CliConfig::default());
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.ingest.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(config.stream.keep_alive_secs, DEFAULT_KEEP_ALIVE_SECS);
        assert!(config.knowledge.path.is_none());
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse(r#"{ "server": { "host": "file.host", "port": 1234 }, "ingest": { "max_frame_bytes": 99 } }"#);
        let cli = CliConfig {
            port: Some(4321),
            max_frame_bytes: Some(512),
            debug: true,
            ..CliConfig::default()
        };
        let config = AppConfig::layer(file, &cli);
        assert_eq!(config.server.host, "file.host");
        assert_eq!(config.server.port, 4321);
        assert_eq!(config.ingest.max_frame_bytes, 512);
        assert!(config.debug);
    }

    #[test]
    fn test_load_from_cli_config_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "server": {{ "port": 7001 }}, "stream": {{ "keep_alive_secs": 3 }} }}"#)
            .unwrap();

        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..CliConfig::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.stream.keep_alive_secs, 3);
    }

    #[test]
    fn test_load_missing_config_path_fails() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/agentdeck.json")),
            ..CliConfig::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..CliConfig::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = AppConfig::layer(FileConfig::default(), &CliConfig::default());
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::layer(FileConfig::default(), &CliConfig::default());
        config.server.host.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::layer(FileConfig::default(), &CliConfig::default());
        config.ingest.max_frame_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_frame_larger_than_buffer() {
        let cli = CliConfig {
            max_frame_bytes: Some(DEFAULT_INGEST_BUFFER_BYTES + 1),
            ..CliConfig::default()
        };
        let config = AppConfig::layer(FileConfig::default(), &cli);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingest.buffer_bytes"));
    }

    #[test]
    fn test_expand_path_tilde() {
        assert_eq!(expand_path(Path::new("/abs/x.json")), PathBuf::from("/abs/x.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path(Path::new("~/x.json")), home.join("x.json"));
        }
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
