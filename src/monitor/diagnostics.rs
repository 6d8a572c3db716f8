use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::runtime_info::{RuntimeMetricsProvider, RuntimeMetricsSnapshot};

use super::identity::{MethodIdentity, MethodKey};
use super::threshold::LiveThreshold;
use super::timer::DecayingTimer;

/// How many breach records the in-memory sink keeps for the API.
pub const DEFAULT_RECENT_BREACHES: usize = 200;

/// Largest capacity accepted from configuration.
pub const RECENT_BREACHES_LIMIT: usize = 10_000;

// ─── Records & sinks ─────────────────────────────────────────────

/// One threshold breach: who, how hot, and the process health right then.
#[derive(Debug, Clone, Serialize)]
pub struct BreachRecord {
    pub key: MethodKey,
    pub type_name: String,
    pub method: String,
    pub one_minute_rate: f64,
    pub threshold: f64,
    pub runtime: RuntimeMetricsSnapshot,
}

/// Destination for breach records. Emission is synchronous.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, record: &BreachRecord) -> Result<(), MonitorError>;
}

/// Writes each breach as a structured WARN event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, record: &BreachRecord) -> Result<(), MonitorError> {
        let rt = &record.runtime;
        warn!(
            class = %record.type_name,
            method = %record.method,
            one_minute_rate = record.one_minute_rate,
            threshold = record.threshold,
            total_physical_memory = rt.total_physical_memory,
            free_physical_memory = rt.free_physical_memory,
            heap_max = rt.heap_max,
            heap_used = rt.heap_used,
            peak_thread_count = ?rt.peak_thread_count,
            thread_count = ?rt.thread_count,
            "{}.{} one-minute rate {:.2}/s over threshold",
            record.type_name,
            record.method,
            record.one_minute_rate,
        );
        Ok(())
    }
}

/// Bounded buffer of the latest breaches, newest last.
#[derive(Debug)]
pub struct RecentBreaches {
    capacity: usize,
    records: Mutex<VecDeque<BreachRecord>>,
}

impl RecentBreaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> Vec<BreachRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentBreaches {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_BREACHES)
    }
}

impl DiagnosticSink for RecentBreaches {
    fn emit(&self, record: &BreachRecord) -> Result<(), MonitorError> {
        let mut records = self.records.lock();
        records.push_back(record.clone());
        if records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }
}

/// Emits to every inner sink; reports the first failure after trying all.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn DiagnosticSink>>) -> Self {
        Self { sinks }
    }
}

impl DiagnosticSink for FanoutSink {
    fn emit(&self, record: &BreachRecord) -> Result<(), MonitorError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

// ─── Threshold gate ──────────────────────────────────────────────

/// What `maybe_log` did. Callers are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    BelowThreshold,
    Emitted,
    /// Snapshot or sink failed; swallowed.
    Failed,
}

/// Emits a breach record whenever a timer's one-minute rate is at or above
/// the live threshold.
///
/// There is no suppression window: a method that stays hot logs on every
/// call.
pub struct ThresholdLogger {
    threshold: Arc<LiveThreshold>,
    provider: Arc<dyn RuntimeMetricsProvider>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ThresholdLogger {
    pub fn new(
        threshold: Arc<LiveThreshold>,
        provider: Arc<dyn RuntimeMetricsProvider>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            threshold,
            provider,
            sink,
        }
    }

    pub fn threshold(&self) -> &Arc<LiveThreshold> {
        &self.threshold
    }

    pub fn provider(&self) -> &Arc<dyn RuntimeMetricsProvider> {
        &self.provider
    }

    /// Never fails and never panics outward.
    pub fn maybe_log(&self, identity: &MethodIdentity, timer: &DecayingTimer) -> LogOutcome {
        let rate = timer.one_minute_rate();
        let threshold = self.threshold.get();
        if rate < threshold {
            return LogOutcome::BelowThreshold;
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.emit_breach(identity, rate, threshold)
        }));

        match attempt {
            Ok(Ok(())) => LogOutcome::Emitted,
            Ok(Err(e)) => {
                debug!(key = %identity.key(), error = %e, "breach diagnostics dropped");
                LogOutcome::Failed
            }
            Err(_) => {
                debug!(key = %identity.key(), "breach diagnostics panicked");
                LogOutcome::Failed
            }
        }
    }

    fn emit_breach(
        &self,
        identity: &MethodIdentity,
        rate: f64,
        threshold: f64,
    ) -> Result<(), MonitorError> {
        let runtime = self.provider.snapshot()?;
        let record = BreachRecord {
            key: identity.key().clone(),
            type_name: identity.type_name().to_owned(),
            method: identity.method().to_owned(),
            one_minute_rate: rate,
            threshold,
            runtime,
        };
        self.sink.emit(&record)
    }
}

impl std::fmt::Debug for ThresholdLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdLogger")
            .field("threshold", &self.threshold.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::clock::ManualClock;
    use crate::runtime_info::fixtures::{BrokenMetrics, FixedMetrics};
    use crate::runtime_info::{MemoryRegionInfo, OperatingSystemInfo, ThreadInfo};
    use std::time::Duration;

    struct RejectingSink;

    impl DiagnosticSink for RejectingSink {
        fn emit(&self, _: &BreachRecord) -> Result<(), MonitorError> {
            Err(MonitorError::Sink("disk full".into()))
        }
    }

    struct PanickingSink;

    struct ThreadlessMetrics;

    impl RuntimeMetricsProvider for ThreadlessMetrics {
        fn operating_system_info(&self) -> Result<OperatingSystemInfo, MonitorError> {
            FixedMetrics.operating_system_info()
        }

        fn memory_regions(&self) -> Result<Vec<MemoryRegionInfo>, MonitorError> {
            FixedMetrics.memory_regions()
        }

        fn thread_info(&self) -> Result<ThreadInfo, MonitorError> {
            Err(MonitorError::MetricsUnavailable("thread list not supported here".into()))
        }
    }

    impl DiagnosticSink for PanickingSink {
        fn emit(&self, _: &BreachRecord) -> Result<(), MonitorError> {
            panic!("sink exploded")
        }
    }

    /// Timer whose one-minute rate is exactly `calls / 5` per second.
    fn timer_at(calls: usize) -> DecayingTimer {
        let clock = Arc::new(ManualClock::new());
        let timer = DecayingTimer::new(clock.clone());
        for _ in 0..calls {
            timer.record(Duration::from_millis(2));
        }
        clock.advance(Duration::from_millis(5_001));
        timer
    }

    fn logger(
        provider: Arc<dyn RuntimeMetricsProvider>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> ThresholdLogger {
        ThresholdLogger::new(Arc::new(LiveThreshold::default()), provider, sink)
    }

    fn identity() -> MethodIdentity {
        MethodIdentity::new("app::services", "UserService", "find_user", 1)
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(FixedMetrics), sink.clone());
        // 4.0 calls/s
        let outcome = logger.maybe_log(&identity(), &timer_at(20));
        assert_eq!(outcome, LogOutcome::BelowThreshold);
        assert!(sink.is_empty());
    }

    #[test]
    fn at_threshold_emits_exactly_one_record() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(FixedMetrics), sink.clone());
        // 5.0 calls/s
        let outcome = logger.maybe_log(&identity(), &timer_at(25));
        assert_eq!(outcome, LogOutcome::Emitted);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].type_name, "UserService");
        assert_eq!(records[0].method, "find_user");
        assert_eq!(records[0].key.as_str(), "UserService.find_user(1)");
        assert!((records[0].one_minute_rate - 5.0).abs() < 1e-9);
        assert_eq!(records[0].runtime.thread_count, Some(17));
    }

    #[test]
    fn every_hot_call_logs_again() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(FixedMetrics), sink.clone());
        let timer = timer_at(50);
        for _ in 0..3 {
            logger.maybe_log(&identity(), &timer);
        }
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn threshold_changes_apply_to_the_next_call() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(FixedMetrics), sink.clone());
        let timer = timer_at(30);

        logger.threshold().set(10.0).unwrap();
        assert_eq!(logger.maybe_log(&identity(), &timer), LogOutcome::BelowThreshold);

        logger.threshold().set(6.0).unwrap();
        assert_eq!(logger.maybe_log(&identity(), &timer), LogOutcome::Emitted);
    }

    #[test]
    fn provider_failure_is_swallowed() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(BrokenMetrics), sink.clone());
        assert_eq!(logger.maybe_log(&identity(), &timer_at(100)), LogOutcome::Failed);
        assert!(sink.is_empty());
    }

    #[test]
    fn missing_thread_figures_still_emit_a_record() {
        let sink = Arc::new(RecentBreaches::default());
        let logger = logger(Arc::new(ThreadlessMetrics), sink.clone());
        assert_eq!(logger.maybe_log(&identity(), &timer_at(40)), LogOutcome::Emitted);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].runtime.heap_used, 300 << 20);
        assert_eq!(records[0].runtime.thread_count, None);
    }

    #[test]
    fn sink_failure_and_panic_are_swallowed() {
        let failing = logger(Arc::new(FixedMetrics), Arc::new(RejectingSink));
        assert_eq!(failing.maybe_log(&identity(), &timer_at(100)), LogOutcome::Failed);

        let panicking = logger(Arc::new(FixedMetrics), Arc::new(PanickingSink));
        assert_eq!(panicking.maybe_log(&identity(), &timer_at(100)), LogOutcome::Failed);
    }

    #[test]
    fn recent_breaches_is_bounded() {
        let sink = Arc::new(RecentBreaches::new(3));
        let logger = logger(Arc::new(FixedMetrics), sink.clone());
        let timer = timer_at(40);
        for _ in 0..10 {
            logger.maybe_log(&identity(), &timer);
        }
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn fanout_reaches_every_sink_despite_failures() {
        let recent = Arc::new(RecentBreaches::default());
        let sinks: Vec<Arc<dyn DiagnosticSink>> =
            vec![Arc::new(RejectingSink), Arc::new(TracingSink), recent.clone()];
        let fanout = FanoutSink::new(sinks);
        let logger = logger(Arc::new(FixedMetrics), Arc::new(fanout));
        assert_eq!(logger.maybe_log(&identity(), &timer_at(40)), LogOutcome::Failed);
        assert_eq!(recent.len(), 1);
    }
}
