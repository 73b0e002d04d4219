//! Data transport layer
//!
//! - `topics` - In-process pub/sub between the HTTP surface and the pipeline

pub mod topics;

pub use topics::{
    Publisher, StreamSubscriber, StreamTopic, Subscriber, Topic, TopicConfig, TopicError,
    TopicMessage, TopicService,
};
