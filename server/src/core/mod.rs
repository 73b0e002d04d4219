//! Core application infrastructure

pub(crate) mod banner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands, ReplayView};
pub use config::{AppConfig, IngestConfig, ServerConfig};
pub use shutdown::ShutdownService;

// Topic types live in data::topics
pub use crate::data::topics::{
    Publisher, StreamSubscriber, StreamTopic, Subscriber, Topic, TopicConfig, TopicError,
    TopicMessage, TopicService,
};
