//! Rain-alert evaluation and dispatch.
//!
//! One run walks the active subscriptions in store order:
//! evaluate forecast → drop same-day repeats → batched, paced delivery →
//! record `last_notified` on success → fold the outcome into run stats.
//! [`AlertScheduler`] fires runs on a cron schedule and exposes the
//! start/stop/trigger/status surface.

pub mod dedup;
pub mod dispatcher;
pub mod evaluator;
pub mod pacer;
pub mod pipeline;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use dedup::DedupFilter;
pub use dispatcher::{BatchDispatcher, DispatchReport, JobResult, RetryPolicy};
pub use evaluator::{Evaluation, Evaluator, FailureKind};
pub use pacer::{DispatchPacer, FixedIntervalPacer};
pub use pipeline::{AlertPipeline, RunReport, RunTrigger};
pub use scheduler::{AlertScheduler, SchedulerState, SchedulerStatus};
pub use stats::{RunStats, RunSummary, StatsAggregator};
pub use store::{MemoryStore, SubscriptionStore};
