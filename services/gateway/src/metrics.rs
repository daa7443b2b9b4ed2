//! Gateway metrics snapshot and OpenMetrics rendering

use serde::Serialize;
use std::fmt::Write;

/// Point-in-time gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayMetrics {
    pub ticks_received: u64,
    pub ticks_decoded: u64,
    pub decode_errors: u64,
    pub order_requests: u64,
    pub order_accepted: u64,
    pub order_rejected: u64,
    pub auth_failures: u64,
    pub rate_limited: u64,
    pub tracked_symbols: u64,
}

/// Render the OpenMetrics exposition for `GET /metrics`.
pub fn render_openmetrics(metrics: &GatewayMetrics, active_orders: u64) -> String {
    let mut out = String::with_capacity(1_024);

    let counters = [
        ("argentum_ticks_received_total", metrics.ticks_received),
        ("argentum_ticks_decoded_total", metrics.ticks_decoded),
        ("argentum_decode_errors_total", metrics.decode_errors),
        ("argentum_order_requests_total", metrics.order_requests),
        ("argentum_order_accepted_total", metrics.order_accepted),
        ("argentum_order_rejected_total", metrics.order_rejected),
        ("argentum_auth_failures_total", metrics.auth_failures),
        ("argentum_rate_limited_total", metrics.rate_limited),
    ];
    for (name, value) in counters {
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(out, "{name} {value}");
    }

    let gauges = [
        ("argentum_active_orders", active_orders),
        ("argentum_tracked_symbols", metrics.tracked_symbols),
    ];
    for (name, value) in gauges {
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name} {value}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openmetrics_series_present() {
        let metrics = GatewayMetrics {
            ticks_received: 10,
            ticks_decoded: 9,
            decode_errors: 1,
            order_requests: 5,
            order_accepted: 3,
            order_rejected: 2,
            auth_failures: 1,
            rate_limited: 1,
            tracked_symbols: 4,
        };
        let text = render_openmetrics(&metrics, 7);

        assert!(text.contains("# TYPE argentum_ticks_received_total counter"));
        assert!(text.contains("argentum_ticks_received_total 10"));
        assert!(text.contains("argentum_decode_errors_total 1"));
        assert!(text.contains("# TYPE argentum_active_orders gauge"));
        assert!(text.contains("argentum_active_orders 7"));
        assert!(text.contains("argentum_tracked_symbols 4"));
    }

    #[test]
    fn test_every_line_is_type_or_sample() {
        let text = render_openmetrics(&GatewayMetrics::default(), 0);
        for line in text.lines() {
            assert!(
                line.starts_with("# TYPE argentum_") || line.starts_with("argentum_"),
                "unexpected line: {line}"
            );
        }
    }
}
