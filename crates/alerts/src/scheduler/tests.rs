//! Tests for the scheduler module.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::Asia::Kolkata;
    use rainalert_core::{
        AlertError, AlertWindow, ForecastOutcome, LanguagePreference, Location, Prediction, Subscription,
    };
    use rainalert_forecast::{ForecastClient, ForecastError};
    use rainalert_notify::{MessageRenderer, NotificationChannel, NotifyError};
    use tokio::sync::Semaphore;

    use crate::dedup::DedupFilter;
    use crate::dispatcher::BatchDispatcher;
    use crate::evaluator::Evaluator;
    use crate::pacer::FixedIntervalPacer;
    use crate::pipeline::AlertPipeline;
    use crate::scheduler::cron::{next_fire, next_fire_after_previous, normalize_cron, parse_schedule};
    use crate::scheduler::{AlertScheduler, SchedulerState};
    use crate::stats::StatsAggregator;
    use crate::store::MemoryStore;

    struct RainyForecast;

    #[async_trait::async_trait]
    impl ForecastClient for RainyForecast {
        async fn evaluate(&self, _lat: f64, _lon: f64, _days: u8, _threshold: f64) -> Result<ForecastOutcome, ForecastError> {
            Ok(ForecastOutcome::from_predictions(vec![Prediction {
                date: NaiveDate::from_ymd_opt(2026, 7, 15).unwrap(),
                days_from_now: 1,
                rain_volume_mm: 8.0,
                precipitation_probability: 90.0,
                temp_min_c: 22.0,
                temp_max_c: 27.0,
                humidity_pct: 92.0,
                wind_speed_kmh: 18.0,
            }]))
        }
    }

    /// Each delivery waits for one permit, so a test can hold a run open.
    struct GatedChannel {
        gate: Arc<Semaphore>,
    }

    #[async_trait::async_trait]
    impl NotificationChannel for GatedChannel {
        async fn deliver(&self, _destination: &str, _message: &str) -> Result<Option<String>, NotifyError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| NotifyError::Config(e.to_string()))?;
            permit.forget();
            Ok(Some("gated".into()))
        }
        fn channel_name(&self) -> &str {
            "gated"
        }
    }

    fn subscription(id: &str) -> Subscription {
        Subscription {
            id: id.into(),
            destination: "+919812345678".into(),
            location: Location {
                latitude: 19.99,
                longitude: 73.79,
                name: Some("Nashik".into()),
            },
            window: AlertWindow {
                lookahead_days: 3,
                threshold_mm: 2.5,
            },
            language: LanguagePreference::Hindi,
            active: true,
            last_notified: None,
        }
    }

    fn pipeline(gate: Arc<Semaphore>) -> Arc<AlertPipeline> {
        pipeline_with_store(gate).0
    }

    fn pipeline_with_store(gate: Arc<Semaphore>) -> (Arc<AlertPipeline>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(vec![subscription("s-1")]));
        let evaluator = Evaluator::new(Arc::new(RainyForecast), Arc::new(MessageRenderer::new().unwrap()));
        let dispatcher = BatchDispatcher::new(
            Arc::new(GatedChannel { gate }),
            store.clone(),
            Arc::new(FixedIntervalPacer::new(Duration::ZERO, Duration::ZERO)),
            5,
        );
        let pipeline = Arc::new(AlertPipeline::new(
            store.clone(),
            evaluator,
            DedupFilter::new(Kolkata),
            dispatcher,
            Arc::new(StatsAggregator::new()),
        ));
        (pipeline, store)
    }

    fn open_gate() -> Arc<Semaphore> {
        Arc::new(Semaphore::new(1_000))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    // -- cron helpers -------------------------------------------------------

    #[test]
    fn normalize_cron_5_to_6_fields() {
        assert_eq!(normalize_cron("0 7 * * *"), "0 0 7 * * *");
        assert_eq!(normalize_cron("30 6 * * 1-5"), "0 30 6 * * 1-5");
    }

    #[test]
    fn normalize_cron_already_6_fields() {
        assert_eq!(normalize_cron("0 0 7 * * *"), "0 0 7 * * *");
    }

    #[test]
    fn normalize_cron_trims_whitespace() {
        assert_eq!(normalize_cron("  0 7 * * *  "), "0 0 7 * * *");
    }

    #[test]
    fn invalid_cron_is_config_error() {
        assert!(matches!(parse_schedule("not a cron"), Err(AlertError::Config(_))));
    }

    #[test]
    fn next_fire_is_seven_am_in_reference_timezone() {
        let schedule = parse_schedule("0 7 * * *").unwrap();

        // 05:30 IST: today's 07:00 IST is still ahead.
        let early = Utc.with_ymd_and_hms(2026, 7, 14, 0, 0, 0).unwrap();
        assert_eq!(
            next_fire(&schedule, early, Kolkata),
            Some(Utc.with_ymd_and_hms(2026, 7, 14, 1, 30, 0).unwrap())
        );

        // 07:30 IST: next is tomorrow 07:00 IST.
        let late = Utc.with_ymd_and_hms(2026, 7, 14, 2, 0, 0).unwrap();
        assert_eq!(
            next_fire(&schedule, late, Kolkata),
            Some(Utc.with_ymd_and_hms(2026, 7, 15, 1, 30, 0).unwrap())
        );
    }

    #[test]
    fn fire_instant_itself_is_not_next() {
        let schedule = parse_schedule("0 7 * * *").unwrap();
        let at_fire = Utc.with_ymd_and_hms(2026, 7, 14, 1, 30, 0).unwrap();
        assert_eq!(
            next_fire(&schedule, at_fire, Kolkata),
            Some(Utc.with_ymd_and_hms(2026, 7, 15, 1, 30, 0).unwrap())
        );
    }

    #[test]
    fn lagging_wall_clock_does_not_repeat_a_fire() {
        let schedule = parse_schedule("0 7 * * *").unwrap();
        let fired = Utc.with_ymd_and_hms(2026, 7, 14, 1, 30, 0).unwrap();
        // Timer woke on time but the wall clock reads slightly earlier.
        let lagging_now = fired - chrono::Duration::milliseconds(100);

        assert_eq!(next_fire(&schedule, lagging_now, Kolkata), Some(fired));
        assert_eq!(
            next_fire_after_previous(&schedule, lagging_now, Some(fired), Kolkata),
            Some(Utc.with_ymd_and_hms(2026, 7, 15, 1, 30, 0).unwrap())
        );
    }

    #[test]
    fn first_fire_and_stale_previous_follow_the_clock() {
        let schedule = parse_schedule("0 7 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 14, 0, 0, 0).unwrap();
        let expected = Some(Utc.with_ymd_and_hms(2026, 7, 14, 1, 30, 0).unwrap());

        assert_eq!(next_fire_after_previous(&schedule, now, None, Kolkata), expected);
        let yesterday = Utc.with_ymd_and_hms(2026, 7, 13, 1, 30, 0).unwrap();
        assert_eq!(next_fire_after_previous(&schedule, now, Some(yesterday), Kolkata), expected);
    }

    // -- lifecycle ------------------------------------------------------------

    #[tokio::test]
    async fn construction_does_not_start() {
        let scheduler = AlertScheduler::new(pipeline(open_gate()), "0 7 * * *", Kolkata).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(scheduler.next_run().is_some());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let scheduler = AlertScheduler::new(pipeline(open_gate()), "0 7 * * *", Kolkata).unwrap();

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert!(scheduler.status().running);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        // Can be started again after a stop.
        assert!(scheduler.start());
        scheduler.shutdown().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn bad_schedule_is_rejected_at_construction() {
        let result = AlertScheduler::new(pipeline(open_gate()), "every morning", Kolkata);
        assert!(matches!(result, Err(AlertError::Config(_))));
    }

    #[tokio::test]
    async fn status_reports_configuration_and_stats() {
        let scheduler = AlertScheduler::new(pipeline(open_gate()), "0 7 * * *", Kolkata).unwrap();
        let report = scheduler.trigger_now().await.unwrap();
        assert_eq!(report.dispatch.succeeded(), 1);

        let status = scheduler.status();
        assert_eq!(status.state, SchedulerState::Stopped);
        assert_eq!(status.schedule, "0 7 * * *");
        assert_eq!(status.timezone, "Asia/Kolkata");
        assert_eq!(status.stats.attempted, 1);
        assert_eq!(status.last_run_at, Some(report.started_at));
        assert!(status.next_run_at.unwrap() > Utc::now());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["stats"]["succeeded"], 1);
    }

    #[tokio::test]
    async fn manual_trigger_during_run_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let scheduler = Arc::new(AlertScheduler::new(pipeline(gate.clone()), "0 7 * * *", Kolkata).unwrap());

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.trigger_now().await }
        });
        wait_until(|| scheduler.pipeline().is_running()).await;

        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(matches!(scheduler.trigger_now().await, Err(AlertError::RunInProgress)));

        gate.add_permits(1);
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.dispatch.succeeded(), 1);

        // The rejected trigger left no trace in the stats.
        let stats = scheduler.status().stats;
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.attempted, 1);
    }

    #[tokio::test]
    async fn manual_run_finishes_after_caller_gives_up() {
        let gate = Arc::new(Semaphore::new(0));
        let (pipeline, store) = pipeline_with_store(gate.clone());
        let scheduler = AlertScheduler::new(pipeline, "0 7 * * *", Kolkata).unwrap();

        // The caller stops waiting while the send is held open.
        let abandoned = tokio::time::timeout(Duration::from_millis(200), scheduler.trigger_now()).await;
        assert!(abandoned.is_err());
        assert!(scheduler.pipeline().is_running());

        gate.add_permits(1);
        let stats = scheduler.pipeline().stats().clone();
        wait_until(|| stats.snapshot().runs_completed == 1).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempted, 1);
        assert_eq!(snapshot.succeeded, 1);
        let subscriber = store.get(&"s-1".into()).await.unwrap();
        assert!(subscriber.last_notified.is_some());
    }

    #[tokio::test]
    async fn scheduled_firing_runs_the_pipeline() {
        let scheduler = AlertScheduler::new(pipeline(open_gate()), "* * * * * *", Kolkata).unwrap();
        scheduler.start();

        let stats = scheduler.pipeline().stats().clone();
        wait_until(|| stats.snapshot().runs_completed >= 1).await;
        scheduler.shutdown().await;

        let last = stats.snapshot().last_run.unwrap();
        assert_eq!(last.trigger, crate::pipeline::RunTrigger::Scheduled);
    }

    #[tokio::test]
    async fn shutdown_lets_in_flight_run_finish() {
        let gate = Arc::new(Semaphore::new(0));
        let scheduler = Arc::new(AlertScheduler::new(pipeline(gate.clone()), "* * * * * *", Kolkata).unwrap());
        scheduler.start();
        wait_until(|| scheduler.pipeline().is_running()).await;

        let shutdown = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.shutdown().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!shutdown.is_finished());

        gate.add_permits(1);
        shutdown.await.unwrap();

        let stats = scheduler.pipeline().stats().snapshot();
        assert_eq!(stats.runs_completed, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
