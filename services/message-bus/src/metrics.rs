//! Per-topic bus metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal atomic counters for one topic.
///
/// Updated by publishers and workers without holding the topic mutex beyond
/// what queue mutation already requires. The latency maximum is folded in
/// with a compare-exchange loop so concurrent publishers never lose a peak.
#[derive(Debug, Default)]
pub(crate) struct TopicCounters {
    pub queue_depth: AtomicU64,
    pub drops: AtomicU64,
    pub backpressure_hits: AtomicU64,
    pub published: AtomicU64,
    pub publish_latency_ns_total: AtomicU64,
    pub publish_latency_ns_max: AtomicU64,
}

impl TopicCounters {
    /// Fold one publish latency sample into the total and the running max.
    pub fn record_publish_latency(&self, elapsed_ns: u64) {
        self.publish_latency_ns_total
            .fetch_add(elapsed_ns, Ordering::Relaxed);

        let mut prev = self.publish_latency_ns_max.load(Ordering::Relaxed);
        while elapsed_ns > prev {
            match self.publish_latency_ns_max.compare_exchange_weak(
                prev,
                elapsed_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => prev = current,
            }
        }
    }

    pub fn snapshot(&self) -> TopicMetrics {
        let published = self.published.load(Ordering::Relaxed);
        let total_latency = self.publish_latency_ns_total.load(Ordering::Relaxed);
        TopicMetrics {
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            backpressure_hits: self.backpressure_hits.load(Ordering::Relaxed),
            published,
            publish_latency_ns_avg: if published == 0 { 0 } else { total_latency / published },
            publish_latency_ns_max: self.publish_latency_ns_max.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopicMetrics {
    pub queue_depth: u64,
    pub drops: u64,
    pub backpressure_hits: u64,
    pub published: u64,
    pub publish_latency_ns_avg: u64,
    pub publish_latency_ns_max: u64,
}
