//! Call timing and threshold-gated diagnostics.
//!
//! An [`Interceptor`] wraps each instrumented call, records its duration in
//! the [`DecayingTimer`] registered for the call's [`MethodKey`], and asks
//! the [`ThresholdLogger`] whether the method's one-minute rate warrants a
//! warning enriched with process health figures.

pub mod clock;
pub mod diagnostics;
pub mod identity;
pub mod interceptor;
pub mod matching;
pub mod percentiles;
pub mod registry;
pub mod threshold;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use diagnostics::{
    BreachRecord, DiagnosticSink, FanoutSink, LogOutcome, RecentBreaches, ThresholdLogger,
    TracingSink,
};
pub use identity::{MethodIdentity, MethodKey};
pub use interceptor::Interceptor;
pub use matching::{MatchPolicy, NamespacePattern};
pub use registry::TimerRegistry;
pub use threshold::LiveThreshold;
pub use timer::{DecayingTimer, TimerSnapshot};
