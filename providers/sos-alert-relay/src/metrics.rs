use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// In-process relay counters, reset on restart
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RelayMetrics {
    pub total_requests: u64,
    pub total_delivered: u64,
    pub total_rejected: u64,
    pub total_failed: u64,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Shared, lock-guarded [`RelayMetrics`]
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: RwLock<RelayMetrics>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        let mut metrics = self.inner.write();
        metrics.total_requests += 1;
        metrics.last_activity = Some(Utc::now());
    }

    pub fn record_delivered(&self) {
        self.inner.write().total_delivered += 1;
    }

    pub fn record_rejected(&self) {
        self.inner.write().total_rejected += 1;
    }

    pub fn record_failure(&self, error: &str) {
        let mut metrics = self.inner.write();
        metrics.total_failed += 1;
        metrics.last_error = Some(error.to_string());
        metrics.last_error_time = Some(Utc::now());
    }

    pub fn snapshot(&self) -> RelayMetrics {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let recorder = MetricsRecorder::new();
        recorder.record_request();
        recorder.record_delivered();
        recorder.record_request();
        recorder.record_rejected();
        recorder.record_request();
        recorder.record_failure("SMTP connection refused");

        let metrics = recorder.snapshot();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.total_delivered, 1);
        assert_eq!(metrics.total_rejected, 1);
        assert_eq!(metrics.total_failed, 1);
        assert_eq!(metrics.last_error.as_deref(), Some("SMTP connection refused"));
        assert!(metrics.last_error_time.is_some());
        assert!(metrics.last_activity.is_some());
    }
}
