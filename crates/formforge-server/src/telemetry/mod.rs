use axum::http::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

pub(crate) const METRIC_SUBSYSTEM: &str = "formforge";
const LATENCY_SAMPLE_CAP: usize = 4096;

#[derive(Default)]
pub(crate) struct RequestMetrics {
    counters: Mutex<BTreeMap<(String, u16), u64>>,
    latencies_ns: Mutex<Vec<u64>>,
}

fn percentile_ns(values: &[u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut v = values.to_vec();
    v.sort_unstable();
    let idx = ((v.len() as f64 - 1.0) * pct).round() as usize;
    v[idx]
}

impl RequestMetrics {
    pub(crate) async fn observe_request(
        &self,
        route: &str,
        status: StatusCode,
        elapsed: Duration,
    ) {
        {
            let mut counters = self.counters.lock().await;
            *counters
                .entry((route.to_string(), status.as_u16()))
                .or_insert(0) += 1;
        }
        let mut latencies = self.latencies_ns.lock().await;
        if latencies.len() >= LATENCY_SAMPLE_CAP {
            latencies.remove(0);
        }
        latencies.push(elapsed.as_nanos() as u64);
    }

    /// Prometheus text exposition: request counts per route/status plus
    /// latency percentiles over a bounded sample window.
    pub(crate) async fn render_prometheus(&self) -> String {
        let mut body = String::new();
        {
            let counters = self.counters.lock().await;
            for ((route, status), count) in counters.iter() {
                body.push_str(&format!(
                    "{METRIC_SUBSYSTEM}_http_requests_total{{route=\"{route}\",status=\"{status}\"}} {count}\n"
                ));
            }
        }
        let latencies = self.latencies_ns.lock().await;
        for (label, pct) in [("0.5", 0.50), ("0.95", 0.95), ("0.99", 0.99)] {
            let value = percentile_ns(&latencies, pct) as f64 / 1_000_000_000.0;
            body.push_str(&format!(
                "{METRIC_SUBSYSTEM}_http_request_latency_seconds{{quantile=\"{label}\"}} {value:.9}\n"
            ));
        }
        body.push_str(&format!(
            "{METRIC_SUBSYSTEM}_http_request_latency_samples {}\n",
            latencies.len()
        ));
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate_per_route_and_status() {
        let metrics = RequestMetrics::default();
        metrics
            .observe_request("/v1/forms", StatusCode::OK, Duration::from_millis(3))
            .await;
        metrics
            .observe_request("/v1/forms", StatusCode::OK, Duration::from_millis(5))
            .await;
        metrics
            .observe_request("/v1/forms", StatusCode::NOT_FOUND, Duration::from_millis(1))
            .await;

        let body = metrics.render_prometheus().await;
        assert!(body.contains(
            "formforge_http_requests_total{route=\"/v1/forms\",status=\"200\"} 2"
        ));
        assert!(body.contains(
            "formforge_http_requests_total{route=\"/v1/forms\",status=\"404\"} 1"
        ));
        assert!(body.contains("formforge_http_request_latency_samples 3"));
    }
}
