//! Benchmark driver: brackets a sequence of schedules with the measurement
//! service's benchmark boundaries.

use benchgrid_matching::Schedule;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::ExecutorResult;
use crate::executor::Executor;
use crate::measurement::{MeasurementService, RunResults};

/// Results of one completed schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleReport {
    pub schedule: Schedule,
    pub runs: Vec<RunResults>,
}

/// Run `schedules` one after another.
///
/// `start-benchmark` must succeed before anything runs. Execution stops at
/// the first failed run. `end-benchmark` is sent in every case once the
/// benchmark started; its failure is only logged.
pub async fn run_benchmark<E, M>(
    executor: &E,
    measurement: &M,
    schedules: &[Schedule],
) -> ExecutorResult<Vec<ScheduleReport>>
where
    E: Executor + ?Sized,
    M: MeasurementService + ?Sized,
{
    measurement.start_benchmark().await?;
    info!(schedules = schedules.len(), "benchmark started");

    let outcome = run_all(executor, schedules).await;

    if let Err(e) = measurement.end_benchmark().await {
        warn!(error = %e, "end-benchmark failed");
    }

    match &outcome {
        Ok(reports) => info!(
            schedules = reports.len(),
            runs = reports.iter().map(|r| r.runs.len()).sum::<usize>(),
            "benchmark finished"
        ),
        Err(e) => error!(kind = e.kind(), error = %e, "benchmark aborted"),
    }
    outcome
}

async fn run_all<E: Executor + ?Sized>(
    executor: &E,
    schedules: &[Schedule],
) -> ExecutorResult<Vec<ScheduleReport>> {
    let mut reports = Vec::with_capacity(schedules.len());
    for (index, schedule) in schedules.iter().enumerate() {
        info!(index, %schedule, "running schedule");
        let runs = executor.run_schedule(schedule).await?;
        reports.push(ScheduleReport {
            schedule: schedule.clone(),
            runs,
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{ExecutorError, VerifyError};
    use crate::testing::{events, Events, MockMeasurement};

    /// Executor that records schedules and fails on a chosen one.
    struct ScriptedExecutor {
        events: Events,
        fail_on: Option<usize>,
        seen: Mutex<usize>,
    }

    impl ScriptedExecutor {
        fn new(events: Events, fail_on: Option<usize>) -> Self {
            Self {
                events,
                fail_on,
                seen: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn verify_environment(&self) -> Vec<VerifyError> {
            Vec::new()
        }

        async fn run_schedule(&self, schedule: &Schedule) -> ExecutorResult<Vec<RunResults>> {
            let index = {
                let mut seen = self.seen.lock().unwrap();
                *seen += 1;
                *seen - 1
            };
            self.events.lock().unwrap().push(format!("schedule {schedule}"));
            if self.fail_on == Some(index) {
                return Err(ExecutorError::Precondition("scripted failure".to_string()));
            }
            Ok(vec![RunResults::new()])
        }
    }

    fn schedules() -> Vec<Schedule> {
        vec![
            [("WL1", "NG1")].into_iter().collect(),
            [("WL1", "NG2")].into_iter().collect(),
            [("WL1", "NG3")].into_iter().collect(),
        ]
    }

    #[tokio::test]
    async fn brackets_all_schedules() {
        let log = events();
        let executor = ScriptedExecutor::new(log.clone(), None);
        let measurement = MockMeasurement::new(log.clone());

        let reports = run_benchmark(&executor, &measurement, &schedules()).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].schedule.group_of("WL1"), Some("NG2"));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start-benchmark",
                "schedule WL1→NG1",
                "schedule WL1→NG2",
                "schedule WL1→NG3",
                "end-benchmark",
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_error_and_still_ends_benchmark() {
        let log = events();
        let executor = ScriptedExecutor::new(log.clone(), Some(1));
        let measurement = MockMeasurement::new(log.clone());

        let err = run_benchmark(&executor, &measurement, &schedules()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Precondition(_)));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start-benchmark",
                "schedule WL1→NG1",
                "schedule WL1→NG2",
                "end-benchmark",
            ]
        );
    }

    #[tokio::test]
    async fn start_failure_runs_nothing() {
        let log = events();
        let executor = ScriptedExecutor::new(log.clone(), None);
        let measurement = MockMeasurement::new(log.clone()).failing("start-benchmark");

        let err = run_benchmark(&executor, &measurement, &schedules()).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Protocol(_)));
        assert_eq!(*log.lock().unwrap(), vec!["start-benchmark"]);
    }

    #[tokio::test]
    async fn end_failure_is_not_fatal() {
        let log = events();
        let executor = Arc::new(ScriptedExecutor::new(log.clone(), None));
        let measurement = MockMeasurement::new(log.clone()).failing("end-benchmark");

        let reports = run_benchmark(executor.as_ref(), &measurement, &schedules()).await.unwrap();
        assert_eq!(reports.len(), 3);
    }
}
