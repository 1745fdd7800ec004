use crate::driver::SessionFactory;
use crate::report::RunReport;
use crate::runtime::{Executor, Outcome};
use crate::scenario::Scenario;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

pub struct Runner<F> {
    factory: F,
    executor: Executor,
    concurrency: usize,
}

impl<F: SessionFactory> Runner<F> {
    pub fn new(factory: F, executor: Executor) -> Self {
        Self {
            factory,
            executor,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Every scenario runs to a terminal state; one failing never stops another.
    /// Outcomes come back in declaration order.
    pub async fn run(&self, scenarios: &[Scenario]) -> RunReport {
        info!(
            scenarios = scenarios.len(),
            concurrency = self.concurrency,
            "run started"
        );
        let mut outcomes: Vec<(usize, Outcome)> = stream::iter(scenarios.iter().enumerate())
            .map(|(idx, scenario)| async move { (idx, self.run_one(scenario).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(idx, _)| *idx);

        let report = RunReport::new(outcomes.into_iter().map(|(_, outcome)| outcome).collect());
        info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            "run finished"
        );
        report
    }

    pub async fn run_one(&self, scenario: &Scenario) -> Outcome {
        let mut session = match self.factory.open().await {
            Ok(session) => session,
            Err(err) => {
                warn!(scenario = %scenario.name, %err, "could not open browser session");
                return Outcome::session_failed(scenario, err);
            }
        };
        let outcome = self.executor.execute(scenario, session.as_mut()).await;
        if let Err(err) = session.close().await {
            warn!(scenario = %scenario.name, %err, "browser session did not close cleanly");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::builtin_scenarios;
    use crate::driver::fake::{FakePage, FakeSessionFactory};
    use crate::oracle::Oracle;
    use std::time::Duration;

    fn executor() -> Executor {
        Executor::new(
            Oracle::new(Duration::from_secs(2), Duration::from_millis(100))
                .with_absence_hold(Duration::from_millis(300)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn builtins_pass_against_calculator_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scenarios = builtin_scenarios("http://localhost:5173");
        for scenario in &mut scenarios {
            for step in &mut scenario.steps {
                if let crate::scenario::Step::Screenshot { path } = step {
                    *path = dir.path().join(path.file_name().expect("file name"));
                }
            }
        }
        let factory = FakeSessionFactory::new(|| FakePage::calculator(Duration::from_millis(400)));
        let runner = Runner::new(factory, executor()).with_concurrency(4);

        let report = runner.run(&scenarios).await;

        assert!(report.all_passed(), "{report}");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report
                .outcomes
                .iter()
                .map(|o| o.scenario.as_str())
                .collect::<Vec<_>>(),
            scenarios.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_stop_other_scenarios() {
        let failing = Scenario::new("failing")
            .navigate("http://localhost:5173")
            .expect_visible("يناير");
        let passing = Scenario::new("passing")
            .navigate("http://localhost:5173")
            .expect_visible("Calculate (Generate Plan)");
        let factory = FakeSessionFactory::new(|| FakePage::calculator(Duration::ZERO));
        let journal = factory.journal();
        let runner = Runner::new(factory, executor());

        let report = runner.run(&[failing, passing]).await;

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.passed_count(), 1);
        assert_ne!(report.exit_code(), 0);
        assert_eq!(
            journal
                .actions()
                .iter()
                .filter(|entry| entry.as_str() == "close")
                .count(),
            2
        );
    }
}
