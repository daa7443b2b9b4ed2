//! Topic state, publish path, and consumer workers
//!
//! Producers and consumers are decoupled by bounded FIFO queues, one per
//! topic. Each topic owns a mutex over its queue and subscriber list plus a
//! pair of condition variables (data-available, space-available). Callbacks
//! run on worker threads outside the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{BackpressurePolicy, BusConfig};
use crate::metrics::{TopicCounters, TopicMetrics};

/// Errors surfaced to publishers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Empty payload, or the bus has been shut down.
    #[error("invalid publish: empty payload or stopped bus")]
    Invalid,
    /// Queue full under DropNewest, or Block wait expired.
    #[error("publish timed out under backpressure")]
    Timeout,
}

type Subscriber = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

struct TopicInner {
    queue: VecDeque<Arc<[u8]>>,
    subscribers: Vec<Subscriber>,
    running: bool,
    consumers_started: bool,
}

struct TopicState {
    name: String,
    inner: Mutex<TopicInner>,
    data_available: Condvar,
    space_available: Condvar,
    counters: TopicCounters,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Topic-based in-process message bus with bounded queues.
///
/// The backpressure policy and queue capacity are fixed at creation. Topics
/// come into existence on first publish or subscribe and are torn down by
/// `shutdown` (also invoked on drop).
pub struct MessageBus {
    config: BusConfig,
    topics: RwLock<HashMap<String, Arc<TopicState>>>,
}

impl MessageBus {
    pub fn new(mut config: BusConfig) -> Self {
        if config.queue_capacity == 0 {
            config.queue_capacity = 1;
        }
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BusConfig::default())
    }

    /// Publish a payload to a topic.
    ///
    /// Returns `BusError::Timeout` when the queue is full under DropNewest,
    /// or when a Block wait expires (or the bus stops) before space frees up.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        if payload.is_empty() {
            return Err(BusError::Invalid);
        }

        let start = Instant::now();
        let state = self.get_or_create_topic(topic);
        let capacity = self.config.queue_capacity;

        let mut inner = state.inner.lock().expect("topic mutex poisoned");
        if !inner.running {
            return Err(BusError::Invalid);
        }

        if inner.queue.len() >= capacity {
            state.counters.backpressure_hits.fetch_add(1, Ordering::Relaxed);
            match self.config.policy {
                BackpressurePolicy::DropNewest => {
                    state.counters.drops.fetch_add(1, Ordering::Relaxed);
                    record_latency(&state, start);
                    return Err(BusError::Timeout);
                }
                BackpressurePolicy::DropOldest => {
                    if inner.queue.pop_front().is_some() {
                        state.counters.drops.fetch_add(1, Ordering::Relaxed);
                        state.counters.queue_depth.fetch_sub(1, Ordering::Relaxed);
                        debug!(topic = state.name.as_str(), "evicted oldest message under backpressure");
                    }
                }
                BackpressurePolicy::Block => {
                    // No reader exists to drain the queue, so blocking would
                    // never make progress: degrade to DropNewest.
                    if self.config.consumer_threads == 0 {
                        state.counters.drops.fetch_add(1, Ordering::Relaxed);
                        record_latency(&state, start);
                        return Err(BusError::Timeout);
                    }
                    inner = self.wait_for_space(&state, inner, capacity);
                    if !inner.running || inner.queue.len() >= capacity {
                        record_latency(&state, start);
                        return Err(BusError::Timeout);
                    }
                }
            }
        }

        inner.queue.push_back(Arc::from(payload));
        state.counters.queue_depth.fetch_add(1, Ordering::Relaxed);
        state.counters.published.fetch_add(1, Ordering::Relaxed);
        state.data_available.notify_one();
        drop(inner);
        record_latency(&state, start);
        Ok(())
    }

    /// Register a callback for a topic. Registration is idempotent in effect:
    /// a subscriber added after consumers are running joins the fan-out on the
    /// next message.
    pub fn subscribe<F>(&self, topic: &str, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let state = self.get_or_create_topic(topic);
        let mut inner = state.inner.lock().expect("topic mutex poisoned");
        inner.subscribers.push(Arc::new(callback));
        if inner.running && !inner.consumers_started && self.config.consumer_threads > 0 {
            inner.consumers_started = true;
            drop(inner);
            self.start_consumers(&state);
        }
    }

    /// Metrics snapshot for a topic; `None` if the topic has never been seen.
    pub fn get_metrics(&self, topic: &str) -> Option<TopicMetrics> {
        let topics = self.topics.read().expect("topics lock poisoned");
        topics.get(topic).map(|state| state.counters.snapshot())
    }

    /// Stop all topics, wake any blocked publishers and workers, and join the
    /// worker threads. Messages still queued are drained by workers on their
    /// way out; anything left after the last worker exits is discarded.
    pub fn shutdown(&self) {
        let states: Vec<Arc<TopicState>> = {
            let topics = self.topics.read().expect("topics lock poisoned");
            topics.values().cloned().collect()
        };

        for state in states {
            {
                let mut inner = state.inner.lock().expect("topic mutex poisoned");
                inner.running = false;
                state.data_available.notify_all();
                state.space_available.notify_all();
            }
            let mut workers = state.workers.lock().expect("worker list poisoned");
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    warn!(topic = state.name.as_str(), "bus worker panicked during shutdown");
                }
            }
        }
    }

    fn get_or_create_topic(&self, topic: &str) -> Arc<TopicState> {
        {
            let topics = self.topics.read().expect("topics lock poisoned");
            if let Some(state) = topics.get(topic) {
                return state.clone();
            }
        }

        let mut topics = self.topics.write().expect("topics lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                debug!(topic, "creating bus topic");
                Arc::new(TopicState {
                    name: topic.to_string(),
                    inner: Mutex::new(TopicInner {
                        queue: VecDeque::new(),
                        subscribers: Vec::new(),
                        running: true,
                        consumers_started: false,
                    }),
                    data_available: Condvar::new(),
                    space_available: Condvar::new(),
                    counters: TopicCounters::default(),
                    workers: Mutex::new(Vec::new()),
                })
            })
            .clone()
    }

    fn wait_for_space<'a>(
        &self,
        state: &TopicState,
        inner: std::sync::MutexGuard<'a, TopicInner>,
        capacity: usize,
    ) -> std::sync::MutexGuard<'a, TopicInner> {
        if self.config.block_timeout_ms == 0 {
            state
                .space_available
                .wait_while(inner, |inner| inner.running && inner.queue.len() >= capacity)
                .expect("topic mutex poisoned")
        } else {
            let timeout = Duration::from_millis(self.config.block_timeout_ms);
            state
                .space_available
                .wait_timeout_while(inner, timeout, |inner| {
                    inner.running && inner.queue.len() >= capacity
                })
                .expect("topic mutex poisoned")
                .0
        }
    }

    fn start_consumers(&self, state: &Arc<TopicState>) {
        let mut workers = state.workers.lock().expect("worker list poisoned");
        for _ in 0..self.config.consumer_threads {
            let state = state.clone();
            workers.push(std::thread::spawn(move || consumer_loop(&state)));
        }
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn record_latency(state: &TopicState, start: Instant) {
    state
        .counters
        .record_publish_latency(start.elapsed().as_nanos() as u64);
}

/// Worker body: pop one message and snapshot the subscriber list under the
/// lock, then dispatch outside it. Exits once the topic is stopped and its
/// queue is empty.
fn consumer_loop(state: &TopicState) {
    loop {
        let (message, subscribers) = {
            let mut inner = state.inner.lock().expect("topic mutex poisoned");
            inner = state
                .data_available
                .wait_while(inner, |inner| inner.running && inner.queue.is_empty())
                .expect("topic mutex poisoned");
            if !inner.running && inner.queue.is_empty() {
                break;
            }
            let message = match inner.queue.pop_front() {
                Some(message) => message,
                None => continue,
            };
            state.counters.queue_depth.fetch_sub(1, Ordering::Relaxed);
            state.space_available.notify_one();
            (message, inner.subscribers.clone())
        };

        for subscriber in &subscribers {
            subscriber(&message);
        }
    }
}
