//! Request counting for the `/metrics` exposition.

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counter for handled `/db` requests, carried in the router state.
///
/// Owns its own registry instead of registering into the process-wide
/// default, so parallel tests never observe each other's counts.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounter::with_opts(Opts::new(
            "http_requests_total",
            "Count of all HTTP requests",
        ))?;
        registry.register(Box::new(requests_total.clone()))?;
        Ok(Self {
            registry,
            requests_total,
        })
    }

    /// Counts one handled request.
    pub fn record_request(&self) {
        self.requests_total.inc();
    }

    /// Current count of handled requests.
    pub fn requests_handled(&self) -> u64 {
        self.requests_total.get()
    }

    /// Renders the prometheus text exposition.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_reflects_recorded_requests() {
        let metrics = Metrics::new().expect("build metrics");
        metrics.record_request();
        metrics.record_request();

        assert_eq!(metrics.requests_handled(), 2);
        let exposition = metrics.encode().expect("encode metrics");
        assert!(exposition.contains("http_requests_total 2"));
    }

    #[test]
    fn separate_instances_do_not_share_counts() {
        let one = Metrics::new().expect("build metrics");
        let two = Metrics::new().expect("build metrics");
        one.record_request();

        assert_eq!(one.requests_handled(), 1);
        assert_eq!(two.requests_handled(), 0);
    }
}
