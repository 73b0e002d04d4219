//! In-process topic system
//!
//! Each topic is a bounded mpsc queue feeding a broadcast fan-out. Publishers
//! reserve bytes from a per-topic budget and get [`TopicError::BufferFull`]
//! instead of blocking when it is exhausted.
//!
//! - **Critical topics** ([`TopicService::topic`]) drain queued messages on
//!   shutdown.
//! - **Ephemeral topics** ([`TopicService::ephemeral_topic`]) are aborted on
//!   shutdown. Used for SSE notifications, which can always be rebuilt from
//!   the projection.
//! - **Stream topics** ([`TopicService::stream_topic`]) have exactly one
//!   consumer reading the queue directly. Messages stay charged against the
//!   byte budget until the consumer acks them, so nothing is skipped and
//!   backpressure tracks consumer progress. Used for incoming frames.

mod error;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

pub use error::TopicError;

use crate::core::config::IngestConfig;

// ============================================================================
// TOPIC MESSAGE TRAIT
// ============================================================================

/// Trait for messages that can be published to topics
pub trait TopicMessage: Clone + Send + Sync + 'static {
    /// Estimate message size in bytes for backpressure
    fn size_bytes(&self) -> usize;
}

// ============================================================================
// TOPIC CONFIG
// ============================================================================

/// Topic configuration
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Byte budget for messages queued but not yet dispatched
    pub buffer_size: usize,
    pub channel_capacity: usize,
}

impl From<&IngestConfig> for TopicConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            buffer_size: config.buffer_bytes,
            channel_capacity: config.channel_capacity,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

// ============================================================================
// PUBLISHER / SUBSCRIBER
// ============================================================================

/// Publisher handle - clone and share across producers
#[derive(Clone, Debug)]
pub struct Publisher<T: TopicMessage> {
    tx: mpsc::Sender<T>,
    buffer_bytes: Arc<AtomicUsize>,
    max_bytes: usize,
}

impl<T: TopicMessage> Publisher<T> {
    /// Publish message (returns error if buffer full)
    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        let msg_size = msg.size_bytes();

        // Atomic CAS to reserve buffer space
        loop {
            let current = self.buffer_bytes.load(Ordering::Relaxed);
            if current + msg_size > self.max_bytes {
                return Err(TopicError::BufferFull);
            }
            if self
                .buffer_bytes
                .compare_exchange(
                    current,
                    current + msg_size,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }

        self.tx.try_send(msg).map_err(|e| {
            self.buffer_bytes.fetch_sub(msg_size, Ordering::SeqCst);
            match e {
                mpsc::error::TrySendError::Full(_) => TopicError::BufferFull,
                mpsc::error::TrySendError::Closed(_) => TopicError::ChannelClosed,
            }
        })
    }
}

/// Subscriber handle
pub struct Subscriber<T: TopicMessage> {
    rx: broadcast::Receiver<T>,
}

impl<T: TopicMessage> Subscriber<T> {
    pub async fn recv(&mut self) -> Result<T, TopicError> {
        self.rx.recv().await.map_err(|e| e.into())
    }
}

// ============================================================================
// TOPIC INNER
// ============================================================================

struct TopicInner<T: TopicMessage> {
    broadcast_tx: broadcast::Sender<T>,
    publisher: Publisher<T>,
}

/// Type-erased topic storage
trait AnyTopic: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: TopicMessage> AnyTopic for TopicInner<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: TopicMessage> AnyTopic for StreamInner<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type TopicMap = HashMap<String, (TypeId, Arc<dyn AnyTopic>)>;

/// Dispatcher entry with shutdown control
struct DispatcherEntry {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
    /// If true, drain messages on shutdown. If false, abort immediately.
    drain_on_shutdown: bool,
}

// ============================================================================
// TOPIC SERVICE
// ============================================================================

/// Central topic service - manages all topics
pub struct TopicService {
    topics: RwLock<TopicMap>,
    streams: RwLock<TopicMap>,
    dispatchers: RwLock<Vec<DispatcherEntry>>,
    default_config: TopicConfig,
}

impl TopicService {
    pub fn new() -> Self {
        Self::with_config(TopicConfig::default())
    }

    pub fn with_config(config: TopicConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            dispatchers: RwLock::new(Vec::new()),
            default_config: config,
        }
    }

    /// Create a critical topic (drains on shutdown) or get the existing one
    pub fn topic<T: TopicMessage>(&self, name: &str) -> Result<Topic<T>, TopicError> {
        self.create_topic_internal(name, self.default_config.clone(), true)
    }

    /// Create an ephemeral topic (aborted on shutdown, no draining)
    pub fn ephemeral_topic<T: TopicMessage>(&self, name: &str) -> Result<Topic<T>, TopicError> {
        self.create_topic_internal(name, self.default_config.clone(), false)
    }

    /// Create a single-consumer stream topic or get the existing one
    pub fn stream_topic<T: TopicMessage>(&self, name: &str) -> Result<StreamTopic<T>, TopicError> {
        let type_id = TypeId::of::<T>();
        let mut streams = self.streams.write();

        if let Some((existing_type, stream)) = streams.get(name) {
            let inner = (*existing_type == type_id)
                .then(|| stream.as_any().downcast_ref::<StreamInner<T>>())
                .flatten()
                .ok_or_else(|| TopicError::TypeMismatch(name.to_string()))?;
            return Ok(inner.handle(name));
        }

        let (tx, rx) = mpsc::channel(self.default_config.channel_capacity);
        let inner = StreamInner {
            publisher: Publisher {
                tx,
                buffer_bytes: Arc::new(AtomicUsize::new(0)),
                max_bytes: self.default_config.buffer_size,
            },
            receiver: Arc::new(Mutex::new(Some(rx))),
        };
        let topic = inner.handle(name);
        streams.insert(name.to_string(), (type_id, Arc::new(inner)));
        tracing::debug!(topic = name, "Stream topic created");

        Ok(topic)
    }

    fn create_topic_internal<T: TopicMessage>(
        &self,
        name: &str,
        config: TopicConfig,
        drain_on_shutdown: bool,
    ) -> Result<Topic<T>, TopicError> {
        let type_id = TypeId::of::<T>();

        // Hold write lock to prevent race conditions
        let mut topics = self.topics.write();

        if let Some((existing_type, topic)) = topics.get(name) {
            let inner = (*existing_type == type_id)
                .then(|| topic.as_any().downcast_ref::<TopicInner<T>>())
                .flatten()
                .ok_or_else(|| TopicError::TypeMismatch(name.to_string()))?;
            return Ok(Topic {
                name: name.to_string(),
                publisher: inner.publisher.clone(),
                broadcast_tx: inner.broadcast_tx.clone(),
            });
        }

        let (mpsc_tx, mpsc_rx) = mpsc::channel(config.channel_capacity);
        let (broadcast_tx, _) = broadcast::channel(config.channel_capacity);
        let buffer_bytes = Arc::new(AtomicUsize::new(0));

        let publisher = Publisher {
            tx: mpsc_tx,
            buffer_bytes: buffer_bytes.clone(),
            max_bytes: config.buffer_size,
        };

        let inner = TopicInner {
            broadcast_tx: broadcast_tx.clone(),
            publisher: publisher.clone(),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle =
            Self::start_dispatcher(mpsc_rx, broadcast_tx.clone(), buffer_bytes, shutdown_rx);
        self.dispatchers.write().push(DispatcherEntry {
            handle,
            shutdown_tx,
            drain_on_shutdown,
        });

        topics.insert(name.to_string(), (type_id, Arc::new(inner)));
        tracing::debug!(topic = name, drain_on_shutdown, "Topic created");

        Ok(Topic {
            name: name.to_string(),
            publisher,
            broadcast_tx,
        })
    }

    fn start_dispatcher<T: TopicMessage>(
        mut rx: mpsc::Receiver<T>,
        broadcast_tx: broadcast::Sender<T>,
        buffer_bytes: Arc<AtomicUsize>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let dispatch = move |msg: T| {
            let msg_size = msg.size_bytes();
            let _ = broadcast_tx.send(msg);
            buffer_bytes.fetch_sub(msg_size, Ordering::SeqCst);
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        // Drain remaining messages before exiting
                        while let Ok(msg) = rx.try_recv() {
                            dispatch(msg);
                        }
                        break;
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(msg) => dispatch(msg),
                            None => break,
                        }
                    }
                }
            }
        })
    }

    /// Gracefully shutdown all dispatcher tasks
    ///
    /// - Critical topics: signal to drain mpsc channels, then wait
    /// - Ephemeral topics: abort immediately
    pub async fn shutdown(&self) {
        let entries: Vec<_> = {
            let mut guard = self.dispatchers.write();
            std::mem::take(&mut *guard)
        };

        let mut critical_handles = Vec::new();

        for entry in entries {
            if entry.drain_on_shutdown {
                let _ = entry.shutdown_tx.send(());
                critical_handles.push(entry.handle);
            } else {
                entry.handle.abort();
                let _ = entry.handle.await;
            }
        }

        for handle in critical_handles {
            let _ = handle.await;
        }
    }
}

impl Default for TopicService {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TOPIC HANDLE
// ============================================================================

/// Handle to a specific topic
#[derive(Clone)]
pub struct Topic<T: TopicMessage> {
    name: String,
    publisher: Publisher<T>,
    broadcast_tx: broadcast::Sender<T>,
}

impl<T: TopicMessage> Topic<T> {
    pub fn publisher(&self) -> Publisher<T> {
        self.publisher.clone()
    }

    pub fn subscribe(&self) -> Subscriber<T> {
        Subscriber {
            rx: self.broadcast_tx.subscribe(),
        }
    }

    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        self.publisher.publish(msg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// STREAM TOPIC
// ============================================================================

struct StreamInner<T: TopicMessage> {
    publisher: Publisher<T>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<T>>>>,
}

impl<T: TopicMessage> StreamInner<T> {
    fn handle(&self, name: &str) -> StreamTopic<T> {
        StreamTopic {
            name: name.to_string(),
            publisher: self.publisher.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

/// Handle to a single-consumer stream topic
#[derive(Clone)]
pub struct StreamTopic<T: TopicMessage> {
    name: String,
    publisher: Publisher<T>,
    receiver: Arc<Mutex<Option<mpsc::Receiver<T>>>>,
}

impl<T: TopicMessage> StreamTopic<T> {
    pub fn publisher(&self) -> Publisher<T> {
        self.publisher.clone()
    }

    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        self.publisher.publish(msg)
    }

    /// Take the one consumer of this stream
    pub fn subscribe(&self) -> Result<StreamSubscriber<T>, TopicError> {
        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TopicError::AlreadySubscribed(self.name.clone()))?;
        Ok(StreamSubscriber {
            rx,
            buffer_bytes: self.publisher.buffer_bytes.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Consumer side of a stream topic
///
/// Dropping the subscriber closes the stream; later publishes fail with
/// [`TopicError::ChannelClosed`].
pub struct StreamSubscriber<T: TopicMessage> {
    rx: mpsc::Receiver<T>,
    buffer_bytes: Arc<AtomicUsize>,
}

impl<T: TopicMessage> StreamSubscriber<T> {
    pub async fn recv(&mut self) -> Result<T, TopicError> {
        self.rx.recv().await.ok_or(TopicError::ChannelClosed)
    }

    /// Release a processed message from the byte budget
    pub fn ack(&self, msg: &T) {
        self.buffer_bytes.fetch_sub(msg.size_bytes(), Ordering::SeqCst);
    }
}
