//! Message-queue driver (read-only).
//!
//! Each message is one JSON object. A read drains a topic until `max_messages` have been
//! consumed or a poll waits `poll_timeout_ms` without receiving anything, so it always
//! terminates.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult};
use crate::types::DataSet;

use super::{json, SourceDriver, SourceKind};

pub(crate) const BACKEND: &str = "queue";

/// Default upper bound on messages consumed by one read.
pub const DEFAULT_MAX_MESSAGES: u64 = 1000;

/// Default time a single poll waits for a message.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

/// Consumer side of a message queue.
pub trait MessageQueue: Send + Sync {
    /// Next message on `topic`, waiting at most `timeout`. `None` means nothing arrived.
    fn poll(&self, topic: &str, timeout: Duration) -> SourceResult<Option<Vec<u8>>>;
}

/// In-process topic queues.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    topics: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    available: Condvar,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to `topic` and wake the waiting consumers.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> SourceResult<()> {
        let mut topics = self.topics.lock().map_err(|_| poisoned())?;
        topics
            .entry(topic.to_string())
            .or_default()
            .push_back(payload.into());
        // Waiters share one condvar across topics, so wake them all.
        self.available.notify_all();
        Ok(())
    }

    /// Messages waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .map(|t| t.get(topic).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

fn poisoned() -> SourceError {
    SourceError::Backend {
        backend: BACKEND,
        message: "queue lock poisoned".to_string(),
    }
}

impl MessageQueue for MemoryQueue {
    fn poll(&self, topic: &str, timeout: Duration) -> SourceResult<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut topics = self.topics.lock().map_err(|_| poisoned())?;
        loop {
            if let Some(msg) = topics.get_mut(topic).and_then(VecDeque::pop_front) {
                return Ok(Some(msg));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _timed_out) = self
                .available
                .wait_timeout(topics, deadline - now)
                .map_err(|_| poisoned())?;
            topics = guard;
        }
    }
}

/// Reads a bounded batch of JSON messages from a topic.
pub struct QueueDriver {
    config: SourceConfig,
    max_messages: u64,
    poll_timeout: Duration,
    client: Arc<dyn MessageQueue>,
}

impl std::fmt::Debug for QueueDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDriver")
            .field("max_messages", &self.max_messages)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl QueueDriver {
    /// Config keys: `topic`, `max_messages`, `poll_timeout_ms`.
    pub fn new(config: SourceConfig, client: Arc<dyn MessageQueue>) -> SourceResult<Self> {
        let max_messages = config
            .u64_key(BACKEND, "max_messages")?
            .unwrap_or(DEFAULT_MAX_MESSAGES);
        let poll_timeout_ms = config
            .u64_key(BACKEND, "poll_timeout_ms")?
            .unwrap_or(DEFAULT_POLL_TIMEOUT_MS);
        Ok(Self {
            config,
            max_messages,
            poll_timeout: Duration::from_millis(poll_timeout_ms),
            client,
        })
    }

    fn topic_for<'a>(&'a self, location: &'a str) -> SourceResult<&'a str> {
        if !location.is_empty() {
            return Ok(location);
        }
        self.config.required_str(BACKEND, "topic")
    }
}

impl SourceDriver for QueueDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Queue
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        let topic = self.topic_for(location)?;
        let mut values = Vec::new();
        while (values.len() as u64) < self.max_messages {
            let Some(payload) = self.client.poll(topic, self.poll_timeout)? else {
                break;
            };
            let value = serde_json::from_slice::<serde_json::Value>(&payload).map_err(|e| {
                SourceError::SchemaMismatch {
                    message: format!("message {} on '{topic}' is not json: {e}", values.len() + 1),
                }
            })?;
            values.push(value);
        }
        json::table_from_values(&values, self.config.schema.as_ref())
    }

    fn write(&self, _table: &DataSet, _location: &str) -> SourceResult<()> {
        Err(SourceError::ReadOnly { backend: BACKEND })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn fast_config() -> SourceConfig {
        SourceConfig::default().with("poll_timeout_ms", 10)
    }

    #[test]
    fn read_stops_when_the_topic_is_drained() {
        let queue = Arc::new(MemoryQueue::new());
        queue.publish("events", r#"{"id": 1}"#).unwrap();
        queue.publish("events", r#"{"id": 2}"#).unwrap();

        let driver = QueueDriver::new(fast_config(), queue.clone()).unwrap();
        let ds = driver.read("events").unwrap();
        assert_eq!(ds.rows, vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]);
        assert_eq!(queue.pending("events"), 0);
    }

    #[test]
    fn read_is_bounded_by_max_messages() {
        let queue = Arc::new(MemoryQueue::new());
        for i in 0..5 {
            queue.publish("events", format!(r#"{{"id": {i}}}"#)).unwrap();
        }
        let driver = QueueDriver::new(fast_config().with("max_messages", 3), queue.clone()).unwrap();
        assert_eq!(driver.read("events").unwrap().row_count(), 3);
        assert_eq!(queue.pending("events"), 2);
    }

    #[test]
    fn poll_times_out_on_an_empty_topic() {
        let queue = MemoryQueue::new();
        let started = Instant::now();
        assert!(queue.poll("none", Duration::from_millis(20)).unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn publish_wakes_the_consumer_of_that_topic() {
        let queue = MemoryQueue::new();
        let wait = Duration::from_secs(5);
        std::thread::scope(|scope| {
            let other = scope.spawn(|| queue.poll("a", Duration::from_millis(300)));
            let started = Instant::now();
            let wanted = scope.spawn(|| queue.poll("b", wait));
            std::thread::sleep(Duration::from_millis(50));
            queue.publish("b", "{}").unwrap();

            assert_eq!(wanted.join().unwrap().unwrap(), Some(b"{}".to_vec()));
            assert!(started.elapsed() < Duration::from_secs(2));
            assert_eq!(other.join().unwrap().unwrap(), None);
        });
    }

    #[test]
    fn writes_are_rejected() {
        let driver = QueueDriver::new(fast_config(), Arc::new(MemoryQueue::new())).unwrap();
        let err = driver.write(&crate::types::sample_table(), "events").unwrap_err();
        assert!(matches!(err, SourceError::ReadOnly { .. }));
    }

    #[test]
    fn non_json_messages_are_reported() {
        let queue = Arc::new(MemoryQueue::new());
        queue.publish("events", "not json").unwrap();
        let driver = QueueDriver::new(fast_config(), queue).unwrap();
        let err = driver.read("events").unwrap_err();
        assert!(err.to_string().contains("message 1 on 'events' is not json"));
    }
}
