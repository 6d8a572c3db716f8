use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::diagnostics::ThresholdLogger;
use super::identity::MethodIdentity;
use super::matching::MatchPolicy;
use super::registry::TimerRegistry;
use super::timer::DecayingTimer;

/// Wraps calls: times them, records into the per-method timer and hands
/// the timer to the threshold logger.
///
/// The wrapped call runs exactly once and its output is returned untouched.
/// Recording happens in a drop guard, so an `Err`, a panic unwinding
/// through the call, or a dropped future are all measured too.
pub struct Interceptor {
    registry: Arc<TimerRegistry>,
    logger: ThresholdLogger,
    policy: MatchPolicy,
}

impl Interceptor {
    pub fn new(registry: Arc<TimerRegistry>, logger: ThresholdLogger, policy: MatchPolicy) -> Self {
        Self {
            registry,
            logger,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<TimerRegistry> {
        &self.registry
    }

    pub fn logger(&self) -> &ThresholdLogger {
        &self.logger
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Measure a synchronous call.
    pub fn intercept<R>(&self, identity: &MethodIdentity, proceed: impl FnOnce() -> R) -> R {
        let _measurement = self.start(identity);
        proceed()
    }

    /// Measure a future from first poll to completion (or drop).
    pub async fn intercept_async<F>(&self, identity: &MethodIdentity, call: F) -> F::Output
    where
        F: Future,
    {
        let _measurement = self.start(identity);
        call.await
    }

    /// Measure a service-layer call when its namespace matches the policy;
    /// otherwise just run it.
    pub async fn observe_service<F>(&self, identity: &MethodIdentity, call: F) -> F::Output
    where
        F: Future,
    {
        if self.policy.matches_service(identity.namespace()) {
            self.intercept_async(identity, call).await
        } else {
            call.await
        }
    }

    fn start<'a>(&'a self, identity: &'a MethodIdentity) -> Measurement<'a> {
        let timer = self.registry.get_or_create(identity.key());
        let clock = self.registry.clock();
        let started = clock.now_nanos();
        Measurement {
            logger: &self.logger,
            identity,
            timer,
            clock,
            started,
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("registry", &self.registry)
            .field("logger", &self.logger)
            .finish()
    }
}

/// In-flight measurement; records on drop.
struct Measurement<'a> {
    logger: &'a ThresholdLogger,
    identity: &'a MethodIdentity,
    timer: Arc<DecayingTimer>,
    clock: Arc<dyn Clock>,
    started: u64,
}

impl Drop for Measurement<'_> {
    fn drop(&mut self) {
        let elapsed = self.clock.now_nanos().saturating_sub(self.started);
        self.timer.record(Duration::from_nanos(elapsed));
        self.logger.maybe_log(self.identity, &self.timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::clock::ManualClock;
    use crate::monitor::diagnostics::{LogOutcome, RecentBreaches};
    use crate::monitor::threshold::LiveThreshold;
    use crate::runtime_info::fixtures::{BrokenMetrics, FixedMetrics};
    use crate::runtime_info::RuntimeMetricsProvider;
    use std::panic::{self, AssertUnwindSafe};

    #[derive(Debug, PartialEq)]
    struct DomainError(&'static str);

    fn interceptor(
        provider: Arc<dyn RuntimeMetricsProvider>,
    ) -> (Arc<ManualClock>, Arc<RecentBreaches>, Interceptor) {
        let clock = Arc::new(ManualClock::new());
        let breaches = Arc::new(RecentBreaches::default());
        let logger = ThresholdLogger::new(
            Arc::new(LiveThreshold::default()),
            provider,
            breaches.clone(),
        );
        let registry = Arc::new(TimerRegistry::new(clock.clone()));
        let interceptor = Interceptor::new(registry, logger, MatchPolicy::default());
        (clock, breaches, interceptor)
    }

    fn identity() -> MethodIdentity {
        crate::method_identity!("Calculator", "add", 2)
    }

    #[test]
    fn returns_the_call_result_and_records_duration() {
        let (clock, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let id = identity();
        let sum = interceptor.intercept(&id, || {
            clock.advance(Duration::from_millis(30));
            2 + 3
        });
        assert_eq!(sum, 5);

        let timer = interceptor.registry().get(id.key()).unwrap();
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.last_duration(), Duration::from_millis(30));
    }

    #[test]
    fn errors_pass_through_and_are_counted() {
        let (_, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let id = identity();
        let out: Result<u32, DomainError> =
            interceptor.intercept(&id, || Err(DomainError("overdrawn")));
        assert_eq!(out, Err(DomainError("overdrawn")));
        assert_eq!(interceptor.registry().get(id.key()).unwrap().count(), 1);
    }

    #[test]
    fn panics_are_measured_and_keep_unwinding() {
        let (_, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let id = identity();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            interceptor.intercept(&id, || -> u32 { panic!("boom") })
        }));
        assert!(caught.is_err());
        assert_eq!(interceptor.registry().get(id.key()).unwrap().count(), 1);
    }

    #[test]
    fn broken_metrics_never_replace_the_result() {
        let (clock, breaches, interceptor) = interceptor(Arc::new(BrokenMetrics));
        let id = identity();
        // push the rate well over the threshold
        for _ in 0..100 {
            interceptor.intercept(&id, || ());
        }
        clock.advance(Duration::from_secs(6));

        let ok: Result<&str, DomainError> = interceptor.intercept(&id, || Ok("genuine"));
        assert_eq!(ok, Ok("genuine"));
        let err: Result<&str, DomainError> =
            interceptor.intercept(&id, || Err(DomainError("genuine")));
        assert_eq!(err, Err(DomainError("genuine")));

        let timer = interceptor.registry().get(id.key()).unwrap();
        assert!(timer.one_minute_rate() >= 5.0);
        assert_eq!(interceptor.logger().maybe_log(&id, &timer), LogOutcome::Failed);
        assert!(breaches.is_empty());
    }

    #[tokio::test]
    async fn async_calls_are_measured() {
        let (clock, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let id = identity();
        let value = interceptor
            .intercept_async(&id, async {
                clock.advance(Duration::from_millis(12));
                "done"
            })
            .await;
        assert_eq!(value, "done");
        let timer = interceptor.registry().get(id.key()).unwrap();
        assert_eq!(timer.last_duration(), Duration::from_millis(12));
    }

    #[tokio::test]
    async fn dropped_futures_are_still_recorded() {
        let (_, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let id = identity();
        let call = interceptor.intercept_async(&id, std::future::pending::<()>());
        let timed_out = tokio::time::timeout(Duration::from_millis(5), call).await;
        assert!(timed_out.is_err());
        assert_eq!(interceptor.registry().get(id.key()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn services_outside_the_pattern_are_not_timed() {
        let (_, _, interceptor) = interceptor(Arc::new(FixedMetrics));
        let outside = MethodIdentity::new("thirdparty::cache", "Cache", "get", 1);
        let inside = MethodIdentity::new(
            concat!(env!("CARGO_CRATE_NAME"), "::services::users"),
            "UserService",
            "find_user",
            1,
        );

        assert_eq!(interceptor.observe_service(&outside, async { 1 }).await, 1);
        assert_eq!(interceptor.observe_service(&inside, async { 2 }).await, 2);

        assert!(interceptor.registry().get(outside.key()).is_none());
        assert_eq!(interceptor.registry().get(inside.key()).unwrap().count(), 1);
    }
}
