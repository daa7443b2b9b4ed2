//! Bus configuration

/// Policy applied when a topic queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Reject the incoming message and report a timeout to the publisher.
    DropNewest,
    /// Evict the oldest queued message to make room for the new one.
    DropOldest,
    /// Wait for space, bounded by `block_timeout_ms` (0 = indefinitely).
    Block,
}

/// Configuration fixed at bus creation.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-topic queue capacity. A value of 0 is coerced to 1.
    pub queue_capacity: usize,
    /// Backpressure policy shared by all topics.
    pub policy: BackpressurePolicy,
    /// Block policy wait bound in milliseconds; 0 waits indefinitely.
    pub block_timeout_ms: u64,
    /// Worker threads spawned per topic once it has subscribers.
    pub consumer_threads: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            policy: BackpressurePolicy::DropNewest,
            block_timeout_ms: 0,
            consumer_threads: 1,
        }
    }
}
