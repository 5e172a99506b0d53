//! Daily firing of the alert pipeline.
//!
//! [`AlertScheduler`] owns a background task that sleeps until the next cron
//! fire time in the configured timezone, runs the pipeline, and repeats.
//! Nothing starts on construction; the host calls `start()`.

mod core;
pub(crate) mod cron;

#[cfg(test)]
mod tests;

pub use self::core::{AlertScheduler, SchedulerState, SchedulerStatus};
