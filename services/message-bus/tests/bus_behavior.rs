//! End-to-end bus behavior tests
//!
//! Covers bounded-memory accounting, single-worker FIFO delivery, the three
//! backpressure policies, and shutdown semantics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use message_bus::{BackpressurePolicy, BusConfig, BusError, MessageBus};

fn wait_until(deadline_ms: u64, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn test_drop_newest_backpressure_scenario() {
    // capacity=2, no consumers, DropNewest: Ok, Ok, Timeout.
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 2,
        policy: BackpressurePolicy::DropNewest,
        block_timeout_ms: 0,
        consumer_threads: 0,
    });

    assert_eq!(bus.publish("market.ticks", b"one"), Ok(()));
    assert_eq!(bus.publish("market.ticks", b"two"), Ok(()));
    assert_eq!(bus.publish("market.ticks", b"three"), Err(BusError::Timeout));

    let metrics = bus.get_metrics("market.ticks").unwrap();
    assert_eq!(metrics.queue_depth, 2);
    assert_eq!(metrics.drops, 1);
    assert_eq!(metrics.backpressure_hits, 1);
    assert_eq!(metrics.published, 2);
}

#[test]
fn test_queue_depth_never_exceeds_capacity() {
    let capacity = 8;
    let bus = MessageBus::new(BusConfig {
        queue_capacity: capacity,
        policy: BackpressurePolicy::DropOldest,
        block_timeout_ms: 0,
        consumer_threads: 0,
    });

    for i in 0..100u32 {
        bus.publish("t", &i.to_le_bytes()).unwrap();
        let metrics = bus.get_metrics("t").unwrap();
        assert!(metrics.queue_depth <= capacity as u64);
    }

    let metrics = bus.get_metrics("t").unwrap();
    assert_eq!(metrics.published, 100);
    assert_eq!(metrics.drops, 100 - capacity as u64);
    // Everything published was either dropped or is still queued for delivery.
    assert_eq!(metrics.drops + metrics.queue_depth, metrics.published);
}

#[test]
fn test_single_worker_preserves_fifo_order() {
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 1024,
        policy: BackpressurePolicy::Block,
        block_timeout_ms: 0,
        consumer_threads: 1,
    });

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    bus.subscribe("ordered", move |payload| {
        let value = u32::from_le_bytes(payload.try_into().unwrap());
        sink.lock().unwrap().push(value);
    });

    for i in 0..500u32 {
        bus.publish("ordered", &i.to_le_bytes()).unwrap();
    }

    assert!(wait_until(2_000, || received.lock().unwrap().len() == 500));
    let received = received.lock().unwrap();
    let expected: Vec<u32> = (0..500).collect();
    assert_eq!(*received, expected);
}

#[test]
fn test_all_subscribers_see_each_message() {
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 64,
        policy: BackpressurePolicy::DropNewest,
        block_timeout_ms: 0,
        consumer_threads: 1,
    });

    let first = Arc::new(AtomicU64::new(0));
    let second = Arc::new(AtomicU64::new(0));
    let a = first.clone();
    let b = second.clone();
    bus.subscribe("fanout", move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    bus.subscribe("fanout", move |_| {
        b.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..10 {
        bus.publish("fanout", b"tick").unwrap();
    }

    assert!(wait_until(2_000, || {
        first.load(Ordering::SeqCst) == 10 && second.load(Ordering::SeqCst) == 10
    }));
}

#[test]
fn test_late_subscriber_joins_fanout() {
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 64,
        policy: BackpressurePolicy::DropNewest,
        block_timeout_ms: 0,
        consumer_threads: 1,
    });

    let early = Arc::new(AtomicU64::new(0));
    let a = early.clone();
    bus.subscribe("late", move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });

    bus.publish("late", b"first").unwrap();
    assert!(wait_until(2_000, || early.load(Ordering::SeqCst) == 1));

    let late = Arc::new(AtomicU64::new(0));
    let b = late.clone();
    bus.subscribe("late", move |_| {
        b.fetch_add(1, Ordering::SeqCst);
    });

    bus.publish("late", b"second").unwrap();
    assert!(wait_until(2_000, || late.load(Ordering::SeqCst) == 1));
    assert_eq!(early.load(Ordering::SeqCst), 2);
}

#[test]
fn test_block_policy_waits_for_drain() {
    let bus = Arc::new(MessageBus::new(BusConfig {
        queue_capacity: 1,
        policy: BackpressurePolicy::Block,
        block_timeout_ms: 0,
        consumer_threads: 1,
    }));

    let delivered = Arc::new(AtomicU64::new(0));
    let sink = delivered.clone();
    bus.subscribe("slow", move |_| {
        std::thread::sleep(Duration::from_millis(5));
        sink.fetch_add(1, Ordering::SeqCst);
    });

    // With capacity 1 and a slow consumer, publishers must block rather than
    // drop; every message still arrives exactly once.
    for _ in 0..20 {
        bus.publish("slow", b"x").unwrap();
    }

    assert!(wait_until(5_000, || delivered.load(Ordering::SeqCst) == 20));
    let metrics = bus.get_metrics("slow").unwrap();
    assert_eq!(metrics.drops, 0);
    assert_eq!(metrics.published, 20);
}

#[test]
fn test_block_timeout_expires() {
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 1,
        policy: BackpressurePolicy::Block,
        block_timeout_ms: 20,
        consumer_threads: 1,
    });

    // No subscriber, so no worker drains the topic.
    bus.publish("stuck", b"a").unwrap();
    let start = Instant::now();
    assert_eq!(bus.publish("stuck", b"b"), Err(BusError::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_shutdown_unblocks_and_stops() {
    let bus = Arc::new(MessageBus::new(BusConfig {
        queue_capacity: 1,
        policy: BackpressurePolicy::Block,
        block_timeout_ms: 0,
        consumer_threads: 1,
    }));

    bus.publish("down", b"a").unwrap();

    let publisher = {
        let bus = bus.clone();
        std::thread::spawn(move || bus.publish("down", b"b"))
    };

    // Give the publisher time to park on the space condvar, then stop the bus.
    std::thread::sleep(Duration::from_millis(20));
    bus.shutdown();

    assert_eq!(publisher.join().unwrap(), Err(BusError::Timeout));
    assert_eq!(bus.publish("down", b"c"), Err(BusError::Invalid));
}

#[test]
fn test_publish_latency_metrics_populated() {
    let bus = MessageBus::new(BusConfig {
        queue_capacity: 16,
        policy: BackpressurePolicy::DropNewest,
        block_timeout_ms: 0,
        consumer_threads: 0,
    });

    for _ in 0..5 {
        bus.publish("lat", b"x").unwrap();
    }

    let metrics = bus.get_metrics("lat").unwrap();
    assert!(metrics.publish_latency_ns_max >= metrics.publish_latency_ns_avg);
}
